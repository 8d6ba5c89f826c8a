//! Inbound dispatch
//!
//! Turns the event source's message stream into bridge calls: control messages
//! drive the barriers, data messages are stored under the period the consumer
//! will take next.

mod clock;
mod dispatcher;
mod inbound;

pub use clock::{ManualClock, PeriodClock};
pub use dispatcher::Dispatcher;
pub use inbound::InboundMessage;
