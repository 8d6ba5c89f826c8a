//! Event Bus - pub/sub for bridge events
//!
//! Uses a tokio broadcast channel. `send` on a broadcast sender never blocks and
//! needs no runtime, so producer threads and the consumer thread can emit from
//! plain OS threads.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::BridgeEvent;
use crate::domain::{MessageType, PeriodIndex};
use crate::exchange::DropReason;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Central event bus for bridge activity
pub struct EventBus {
    tx: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no subscribers the event is dropped. If a subscriber falls
    /// behind, it loses the oldest events.
    pub fn emit(&self, event: BridgeEvent) {
        debug!(
            event_type = event.event_type(),
            session_id = event.session_id(),
            "EventBus::emit"
        );
        // No subscribers is OK
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to one session
    pub fn emitter_for(&self, session_id: impl Into<String>) -> EventEmitter {
        let session_id = session_id.into();
        debug!(%session_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            session_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for components to emit events without owning the bus
///
/// Cheap to clone; every event it emits carries its session ID.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    tx: broadcast::Sender<BridgeEvent>,
    session_id: String,
}

impl EventEmitter {
    /// Emitter whose events go nowhere
    pub fn detached(session_id: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: BridgeEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn session_started(&self) {
        self.emit(BridgeEvent::SessionStarted {
            session_id: self.session_id.clone(),
        });
    }

    pub fn session_ended(&self) {
        self.emit(BridgeEvent::SessionEnded {
            session_id: self.session_id.clone(),
        });
    }

    pub fn period_completed(&self, period: PeriodIndex) {
        self.emit(BridgeEvent::PeriodCompleted {
            session_id: self.session_id.clone(),
            period,
        });
    }

    pub fn messages_taken(&self, period: PeriodIndex, message_count: usize, evicted: usize) {
        self.emit(BridgeEvent::MessagesTaken {
            session_id: self.session_id.clone(),
            period,
            message_count,
            evicted,
        });
    }

    pub fn singleton_overwritten(&self, period: PeriodIndex, message_type: &MessageType) {
        self.emit(BridgeEvent::SingletonOverwritten {
            session_id: self.session_id.clone(),
            period,
            message_type: message_type.clone(),
        });
    }

    pub fn message_dropped(&self, period: PeriodIndex, message_type: &MessageType, reason: DropReason) {
        self.emit(BridgeEvent::MessageDropped {
            session_id: self.session_id.clone(),
            period,
            message_type: message_type.clone(),
            reason,
        });
    }

    pub fn ordering_violation(&self, period: PeriodIndex, last_completed: PeriodIndex) {
        self.emit(BridgeEvent::OrderingViolation {
            session_id: self.session_id.clone(),
            period,
            last_completed,
        });
    }

    pub fn submitted(&self, message_type: &MessageType) {
        self.emit(BridgeEvent::Submitted {
            session_id: self.session_id.clone(),
            message_type: message_type.clone(),
        });
    }

    pub fn submit_failed(&self, message_type: &MessageType, error: &str) {
        self.emit(BridgeEvent::SubmitFailed {
            session_id: self.session_id.clone(),
            message_type: message_type.clone(),
            error: error.to_string(),
        });
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus(capacity: usize) -> Arc<EventBus> {
    Arc::new(EventBus::new(capacity))
}
