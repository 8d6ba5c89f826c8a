//! Session wiring
//!
//! Builds one bridge with its collaborators. Nothing is global: every session
//! owns its own barriers, exchange and event bus.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::bridge::{ChannelTransport, ControlBridge};
use crate::config::Config;
use crate::dispatch::{Dispatcher, ManualClock};
use crate::domain::Envelope;
use crate::events::{EventBus, create_event_bus};

/// Everything a running session needs
pub struct Session {
    pub bridge: Arc<ControlBridge>,
    pub dispatcher: Arc<Dispatcher>,
    pub clock: Arc<ManualClock>,
    pub events: Arc<EventBus>,
    /// Messages submitted by the control process
    pub outbound: mpsc::UnboundedReceiver<Envelope>,
}

impl Session {
    pub fn assemble(config: &Config) -> Self {
        let session_id = Uuid::now_v7().to_string();
        let events = create_event_bus(config.event_capacity);
        let (transport, outbound) = ChannelTransport::new();

        let bridge = Arc::new(ControlBridge::new(
            config.bridge_options(),
            Arc::new(transport),
            events.emitter_for(session_id.clone()),
        ));
        let clock = Arc::new(ManualClock::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&bridge), clock.clone()));

        info!(%session_id, retention = config.retention_window, "Session assembled");
        Self {
            bridge,
            dispatcher,
            clock,
            events,
            outbound,
        }
    }

    pub fn session_id(&self) -> &str {
        self.bridge.session_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{InboundMessage, PeriodClock};
    use serde_json::json;

    #[test]
    fn test_sessions_are_independent() {
        let config = Config::default();
        let first = Session::assemble(&config);
        let second = Session::assemble(&config);

        assert_ne!(first.session_id(), second.session_id());
        first.dispatcher.dispatch(InboundMessage::SimStart);
        assert!(first.bridge.is_started());
        assert!(!second.bridge.is_started());
    }

    #[test]
    fn test_dispatch_to_outbound_round() {
        let mut session = Session::assemble(&Config::default());
        session.dispatcher.dispatch(InboundMessage::TimeslotUpdate { period: 1 });
        assert_eq!(session.clock.current_period(), 1);

        session.bridge.submit(Envelope::new("Order", json!({"mwh": 3.0}))).unwrap();
        assert_eq!(session.outbound.try_recv().unwrap().payload, json!({"mwh": 3.0}));
    }
}
