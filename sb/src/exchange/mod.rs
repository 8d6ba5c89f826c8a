//! Message exchange
//!
//! Producer threads classify inbound messages by type and store them under the
//! period they belong to. The consumer takes a whole period at a time. Keying by
//! period means a message that arrives after one drain but before the next
//! period boundary can never be attributed to the wrong period.

mod store;

pub use store::{DropReason, ExchangeStats, IngestOutcome, MessageExchange};

use crate::domain::PeriodIndex;

/// Periods kept behind the most recent drain
pub const DEFAULT_RETENTION_WINDOW: PeriodIndex = 3;
