//! Slotbridge - period-keyed message exchange for a control process
//!
//! An event source delivers messages on its own threads; a control process
//! wants to run once per simulation period, see every message that belongs to
//! that period, and send replies. Slotbridge sits between them.
//!
//! # Core Concepts
//!
//! - **Period buckets**: inbound messages are stored under the period they
//!   belong to and drained exactly once
//! - **Barriers**: the consumer blocks on session start and on period
//!   completion instead of polling
//! - **One facade**: [`bridge::ControlBridge`] is the only surface the
//!   control process touches, in process or over the [`ipc`] gateway
//!
//! # Modules
//!
//! - [`domain`] - periods, message types, envelopes, buckets
//! - [`sync`] - rendezvous and period barriers, delay probe
//! - [`exchange`] - the period-keyed message store
//! - [`bridge`] - the control bridge facade and transport seam
//! - [`dispatch`] - routing of inbound messages onto the bridge
//! - [`events`] - event bus and journal
//! - [`ipc`] - Unix socket gateway
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod bridge;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod events;
pub mod exchange;
pub mod ipc;
pub mod session;
pub mod sync;

pub use bridge::{BridgeError, BridgeOptions, BridgeResult, ChannelTransport, ControlBridge, Transport, TransportError};
pub use config::Config;
pub use dispatch::{Dispatcher, InboundMessage, ManualClock, PeriodClock};
pub use domain::{Envelope, MessageKind, MessageType, NO_PERIOD, PeriodBucket, PeriodIndex, Slot};
pub use events::{BridgeEvent, EventBus, EventEmitter, EventJournal, EventLogEntry, create_event_bus, spawn_event_journal};
pub use exchange::{DropReason, ExchangeStats, IngestOutcome, MessageExchange};
pub use ipc::{BridgeClient, BridgeRequest, BridgeResponse};
pub use session::Session;
pub use sync::{DelayProbe, PeriodBarrier, RendezvousBarrier, WaitError};
