//! Domain types for the slot bridge
//!
//! Periods, message types, envelopes and the per-period bucket that the
//! exchange hands out on drain.

mod bucket;
mod message;

pub use bucket::{PeriodBucket, PutResult, Slot};
pub use message::{Envelope, MessageKind, MessageType};

/// Index of a discrete simulation period (timeslot)
pub type PeriodIndex = i64;

/// Sentinel below every valid period
pub const NO_PERIOD: PeriodIndex = -1;
