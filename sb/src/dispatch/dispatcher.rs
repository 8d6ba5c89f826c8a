//! Routes inbound messages onto the bridge

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::clock::PeriodClock;
use super::inbound::InboundMessage;
use crate::bridge::ControlBridge;
use crate::domain::{Envelope, MessageType, NO_PERIOD, PeriodIndex};
use crate::exchange::IngestOutcome;
use crate::sync::lock_or_abort;

/// Feeds the bridge from the event source
///
/// Data is filed under the period the consumer will take next: the clock's
/// current period, or the period after the last completed one when the
/// source is between a `TimeslotComplete` and the next `TimeslotUpdate`.
/// Bootstrap data that arrives before any period is known is held and
/// released into the first period the source announces.
pub struct Dispatcher {
    bridge: Arc<ControlBridge>,
    clock: Arc<dyn PeriodClock>,
    cash: AtomicU64,
    early: Mutex<Vec<Envelope>>,
}

impl Dispatcher {
    pub fn new(bridge: Arc<ControlBridge>, clock: Arc<dyn PeriodClock>) -> Self {
        Self {
            bridge,
            clock,
            cash: AtomicU64::new(0f64.to_bits()),
            early: Mutex::new(Vec::new()),
        }
    }

    /// Route one message
    ///
    /// Returns the ingest outcome for stored messages. Control messages and
    /// data held until the first period opens return `None`.
    pub fn dispatch(&self, message: InboundMessage) -> Option<IngestOutcome> {
        debug!(message = %message.name(), "dispatch: called");
        match message {
            InboundMessage::SimStart => {
                self.bridge.on_session_start();
                None
            }
            InboundMessage::SimEnd { payload } => {
                let period = self.target_period();
                self.release_early(period);
                let outcome = self.bridge.ingest(period, Envelope::new(MessageType::SimEnd, payload));
                self.bridge.on_session_end();
                Some(outcome)
            }
            InboundMessage::TimeslotUpdate { period } => {
                self.clock.observe(period);
                self.release_early(self.target_period());
                None
            }
            InboundMessage::TimeslotComplete { period } => {
                self.release_early(period);
                self.bridge.on_period_complete(period);
                None
            }
            InboundMessage::Data { message_type, payload } => {
                if message_type == MessageType::CashPosition {
                    self.record_cash(&payload);
                }
                self.store(Envelope::new(message_type, payload))
            }
        }
    }

    /// Parse and route one JSON line; malformed lines are logged and skipped
    pub fn dispatch_line(&self, line: &str) -> Option<IngestOutcome> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<InboundMessage>(line) {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                warn!(error = %e, "dispatch_line: skipping malformed message");
                None
            }
        }
    }

    /// Latest balance reported by a cash position
    pub fn cash_balance(&self) -> f64 {
        f64::from_bits(self.cash.load(Ordering::SeqCst))
    }

    /// Number of messages waiting for the first period
    pub fn held_count(&self) -> usize {
        lock_or_abort(&self.early, "dispatcher").len()
    }

    /// Period the consumer will take next
    fn target_period(&self) -> PeriodIndex {
        self.clock
            .current_period()
            .max(self.bridge.last_completed().saturating_add(1))
    }

    fn store(&self, envelope: Envelope) -> Option<IngestOutcome> {
        {
            let mut early = lock_or_abort(&self.early, "dispatcher");
            if self.clock.current_period() == NO_PERIOD && self.bridge.last_completed() == NO_PERIOD {
                debug!(message_type = %envelope.message_type, "store: holding until the first period");
                early.push(envelope);
                return None;
            }
        }
        Some(self.bridge.ingest(self.target_period(), envelope))
    }

    fn release_early(&self, period: PeriodIndex) {
        let mut early = lock_or_abort(&self.early, "dispatcher");
        if early.is_empty() {
            return;
        }
        info!(period, messages = early.len(), "Releasing early messages");
        for envelope in early.drain(..) {
            self.bridge.ingest(period, envelope);
        }
    }

    fn record_cash(&self, payload: &serde_json::Value) {
        match payload.get("balance").and_then(|b| b.as_f64()) {
            Some(balance) => {
                self.cash.store(balance.to_bits(), Ordering::SeqCst);
                info!("Cash position: {}", balance);
            }
            None => warn!("CashPosition without numeric balance"),
        }
    }
}
