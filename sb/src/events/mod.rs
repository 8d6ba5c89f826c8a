//! Event bus for bridge observability
//!
//! Every significant state change in a session emits a [`BridgeEvent`]: the
//! start and end of the session, period completions and drains, and anomalies
//! in the inbound stream such as overwritten singletons or dropped late
//! messages. Consumers (the journal, tests, an operator tool) subscribe to the
//! bus.
//!
//! ```text
//!   producer threads          consumer thread
//!   (ingest / advance)        (take / submit)
//!          │                        │
//!          └──────────┬─────────────┘
//!                     ▼
//!         ┌───────────────────────┐
//!         │       EVENT BUS       │
//!         │  (tokio broadcast)    │
//!         └───────────────────────┘
//!                     │
//!          ┌──────────┴──────────┐
//!          ▼                     ▼
//!   EventJournal (.jsonl)     subscribers
//! ```
//!
//! Events are emitted after the component that produced them has released its
//! lock.

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use logger::{EventJournal, read_session_events, spawn_event_journal};
pub use types::{BridgeEvent, EventLogEntry};
