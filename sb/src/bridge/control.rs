//! ControlBridge - the facade the control process talks to
//!
//! Producer threads call the `on_*` methods and [`ControlBridge::ingest`]; the
//! single consumer thread calls the `await_*` methods, `take_messages` and
//! `submit`. Each collaborator guards its own state and the bridge never holds
//! one lock while calling into another component.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::BridgeResult;
use super::transport::Transport;
use crate::domain::{Envelope, PeriodBucket, PeriodIndex};
use crate::events::EventEmitter;
use crate::exchange::{DEFAULT_RETENTION_WINDOW, ExchangeStats, IngestOutcome, MessageExchange};
use crate::sync::{PeriodBarrier, RendezvousBarrier};

/// Tunables for one bridge instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Periods kept behind the last drain
    pub retention: PeriodIndex,
    /// Default bound on the `await_*` calls; `None` blocks indefinitely
    pub wait_timeout: Option<Duration>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION_WINDOW,
            wait_timeout: None,
        }
    }
}

pub struct ControlBridge {
    started: RendezvousBarrier,
    periods: PeriodBarrier,
    exchange: MessageExchange,
    transport: Arc<dyn Transport>,
    events: EventEmitter,
    wait_timeout: Option<Duration>,
    ended: AtomicBool,
}

impl ControlBridge {
    pub fn new(options: BridgeOptions, transport: Arc<dyn Transport>, events: EventEmitter) -> Self {
        debug!(session_id = %events.session_id(), ?options, "ControlBridge::new: called");
        Self {
            started: RendezvousBarrier::new("session-start"),
            periods: PeriodBarrier::new("period-complete"),
            exchange: MessageExchange::new(options.retention, events.clone()),
            transport,
            events,
            wait_timeout: options.wait_timeout,
            ended: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> &str {
        self.events.session_id()
    }

    pub fn default_wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    // === Producer side ===

    /// The event source reported the start of the session
    pub fn on_session_start(&self) {
        info!(session_id = %self.session_id(), "SimStart");
        let cycle = self.started.signal();
        if cycle > 0 {
            warn!(cycle, "on_session_start: session already started");
        }
        self.events.session_started();
    }

    /// The event source reported the end of the session
    pub fn on_session_end(&self) {
        info!(session_id = %self.session_id(), "SimEnd");
        self.ended.store(true, Ordering::SeqCst);
        self.events.session_ended();
    }

    /// No more messages will arrive for `period`
    pub fn on_period_complete(&self, period: PeriodIndex) {
        info!(period, "period complete");
        if self.periods.advance(period) {
            self.events.period_completed(period);
        } else {
            self.events.ordering_violation(period, self.periods.last_completed());
        }
    }

    /// Store an inbound message under `period`
    pub fn ingest(&self, period: PeriodIndex, envelope: Envelope) -> IngestOutcome {
        self.exchange.ingest(period, envelope)
    }

    // === Consumer side ===

    /// Block until the session has started, bounded by the default timeout
    pub fn await_session_start(&self) -> BridgeResult<()> {
        self.await_session_start_timeout(self.wait_timeout)
    }

    pub fn await_session_start_timeout(&self, timeout: Option<Duration>) -> BridgeResult<()> {
        info!(?timeout, "Waiting for start");
        self.started.wait_timeout(timeout)?;
        info!("Started");
        Ok(())
    }

    /// Block until a period newer than `after` completes; returns that period
    pub fn await_period_complete(&self, after: PeriodIndex) -> BridgeResult<PeriodIndex> {
        self.await_period_complete_timeout(after, self.wait_timeout)
    }

    pub fn await_period_complete_timeout(&self, after: PeriodIndex, timeout: Option<Duration>) -> BridgeResult<PeriodIndex> {
        debug!(after, ?timeout, "await_period_complete: called");
        let period = self.periods.await_through_timeout(after, timeout)?;
        debug!(after, period, "await_period_complete: released");
        Ok(period)
    }

    /// Drain the messages stored for `period`; empty if already taken
    pub fn take_messages(&self, period: PeriodIndex) -> PeriodBucket {
        self.exchange.drain(period)
    }

    /// Hand a message to the transport
    pub fn submit(&self, envelope: Envelope) -> BridgeResult<()> {
        let message_type = envelope.message_type.clone();
        match self.transport.send(envelope) {
            Ok(()) => {
                debug!(%message_type, "submit: sent");
                self.events.submitted(&message_type);
                Ok(())
            }
            Err(e) => {
                warn!(%message_type, error = %e, "submit: transport refused message");
                self.events.submit_failed(&message_type, &e.to_string());
                Err(e.into())
            }
        }
    }

    /// Liveness probe; only logs
    pub fn log_test(&self, text: &str) {
        info!("Log test: {}", text);
    }

    // === In-process status ===

    pub fn is_started(&self) -> bool {
        self.started.is_signaled()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    pub fn last_completed(&self) -> PeriodIndex {
        self.periods.last_completed()
    }

    pub fn exchange_stats(&self) -> ExchangeStats {
        self.exchange.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeError, ChannelTransport, TransportError};
    use crate::domain::MessageType;
    use crate::events::{BridgeEvent, EventBus};
    use serde_json::json;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    struct RefusingTransport;

    impl Transport for RefusingTransport {
        fn send(&self, _envelope: Envelope) -> Result<(), TransportError> {
            Err(TransportError::Rejected("offline".to_string()))
        }
    }

    fn bridge() -> (Arc<ControlBridge>, tokio::sync::mpsc::UnboundedReceiver<Envelope>) {
        let (transport, rx) = ChannelTransport::new();
        let bridge = ControlBridge::new(BridgeOptions::default(), Arc::new(transport), EventEmitter::detached("test"));
        (Arc::new(bridge), rx)
    }

    #[test]
    fn test_period_five_scenario() {
        let (bridge, _rx) = bridge();
        bridge.ingest(5, Envelope::new("CashPosition", json!({"balance": 120.0})));
        bridge.ingest(5, Envelope::new("ClearedTrade", json!("a")));
        bridge.ingest(5, Envelope::new("ClearedTrade", json!("b")));
        bridge.on_period_complete(5);

        assert_eq!(bridge.await_period_complete(4).unwrap(), 5);

        let messages = bridge.take_messages(5);
        assert_eq!(
            serde_json::to_value(&messages).unwrap(),
            json!({"CashPosition": {"balance": 120.0}, "ClearedTrade": ["a", "b"]})
        );
        assert!(bridge.take_messages(5).is_empty());
    }

    #[test]
    fn test_three_waiters_released_by_one_start() {
        let (bridge, _rx) = bridge();
        let (tx, rx) = mpsc::channel();

        for _ in 0..3 {
            let bridge = Arc::clone(&bridge);
            let tx = tx.clone();
            thread::spawn(move || {
                bridge.await_session_start().unwrap();
                tx.send(Instant::now()).unwrap();
            });
        }

        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());
        let signaled_at = Instant::now();
        bridge.on_session_start();

        for _ in 0..3 {
            let released_at = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert!(released_at >= signaled_at);
        }
        assert!(bridge.is_started());
    }

    #[test]
    fn test_default_timeout_applies() {
        let (transport, _rx) = ChannelTransport::new();
        let options = BridgeOptions {
            wait_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let bridge = ControlBridge::new(options, Arc::new(transport), EventEmitter::detached("test"));

        assert_eq!(
            bridge.await_session_start(),
            Err(BridgeError::TimedOut(Duration::from_millis(20)))
        );
        assert_eq!(
            bridge.await_period_complete(0),
            Err(BridgeError::TimedOut(Duration::from_millis(20)))
        );
    }

    #[test]
    fn test_submit_forwards_to_transport() {
        let (bridge, mut rx) = bridge();
        bridge.submit(Envelope::new("Order", json!({"mwh": -1.0}))).unwrap();
        assert_eq!(rx.try_recv().unwrap().message_type, MessageType::Order);
    }

    #[test]
    fn test_submit_failure_is_surfaced() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let bridge = ControlBridge::new(BridgeOptions::default(), Arc::new(RefusingTransport), bus.emitter_for("s"));

        let result = bridge.submit(Envelope::new("Order", json!({})));
        assert_eq!(
            result,
            Err(BridgeError::Transport(TransportError::Rejected("offline".to_string())))
        );
        assert_eq!(events.try_recv().unwrap().event_type(), "SubmitFailed");
    }

    #[test]
    fn test_backwards_completion_reported() {
        let bus = EventBus::new(16);
        let (transport, _rx) = ChannelTransport::new();
        let bridge = ControlBridge::new(BridgeOptions::default(), Arc::new(transport), bus.emitter_for("s"));
        bridge.on_period_complete(8);

        let mut events = bus.subscribe();
        bridge.on_period_complete(6);
        match events.try_recv().unwrap() {
            BridgeEvent::OrderingViolation { period, last_completed, .. } => {
                assert_eq!(period, 6);
                assert_eq!(last_completed, 8);
            }
            other => panic!("Expected OrderingViolation, got {:?}", other),
        }
        assert_eq!(bridge.last_completed(), 8);
    }

    #[test]
    fn test_session_end_flag() {
        let (bridge, _rx) = bridge();
        assert!(!bridge.is_ended());
        bridge.on_session_end();
        assert!(bridge.is_ended());
    }

    #[test]
    fn test_log_test_has_no_effect() {
        let (bridge, _rx) = bridge();
        bridge.log_test("hello");
        assert!(!bridge.is_started());
        assert_eq!(bridge.exchange_stats(), ExchangeStats::default());
    }
}
