//! Event types for bridge activity
//!
//! These events describe everything observable about a session:
//! - Session lifecycle (start, end)
//! - Period completion and drains
//! - Anomalies in the inbound stream (overwrites, drops, ordering violations)
//! - Outbound submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MessageType, PeriodIndex};
use crate::exchange::DropReason;

/// Core event enum - the vocabulary of bridge activity
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    // === Session Lifecycle ===
    /// The event source reported the start of the session
    SessionStarted { session_id: String },
    /// The event source reported the end of the session
    SessionEnded { session_id: String },

    // === Periods ===
    /// A period was reported complete
    PeriodCompleted { session_id: String, period: PeriodIndex },
    /// The consumer drained a period
    MessagesTaken {
        session_id: String,
        period: PeriodIndex,
        message_count: usize,
        evicted: usize,
    },

    // === Inbound Anomalies ===
    /// A singleton message replaced an earlier one in the same period
    SingletonOverwritten {
        session_id: String,
        period: PeriodIndex,
        message_type: MessageType,
    },
    /// A message arrived for a period that can no longer accept it
    MessageDropped {
        session_id: String,
        period: PeriodIndex,
        message_type: MessageType,
        reason: DropReason,
    },
    /// Completion was reported out of order
    OrderingViolation {
        session_id: String,
        period: PeriodIndex,
        last_completed: PeriodIndex,
    },

    // === Outbound ===
    /// A message was handed to the transport
    Submitted { session_id: String, message_type: MessageType },
    /// The transport refused a message
    SubmitFailed {
        session_id: String,
        message_type: MessageType,
        error: String,
    },
}

impl BridgeEvent {
    /// Get the session ID for this event
    pub fn session_id(&self) -> &str {
        match self {
            BridgeEvent::SessionStarted { session_id }
            | BridgeEvent::SessionEnded { session_id }
            | BridgeEvent::PeriodCompleted { session_id, .. }
            | BridgeEvent::MessagesTaken { session_id, .. }
            | BridgeEvent::SingletonOverwritten { session_id, .. }
            | BridgeEvent::MessageDropped { session_id, .. }
            | BridgeEvent::OrderingViolation { session_id, .. }
            | BridgeEvent::Submitted { session_id, .. }
            | BridgeEvent::SubmitFailed { session_id, .. } => session_id,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            BridgeEvent::SessionStarted { .. } => "SessionStarted",
            BridgeEvent::SessionEnded { .. } => "SessionEnded",
            BridgeEvent::PeriodCompleted { .. } => "PeriodCompleted",
            BridgeEvent::MessagesTaken { .. } => "MessagesTaken",
            BridgeEvent::SingletonOverwritten { .. } => "SingletonOverwritten",
            BridgeEvent::MessageDropped { .. } => "MessageDropped",
            BridgeEvent::OrderingViolation { .. } => "OrderingViolation",
            BridgeEvent::Submitted { .. } => "Submitted",
            BridgeEvent::SubmitFailed { .. } => "SubmitFailed",
        }
    }
}

/// A timestamped event log entry for file persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Timestamp of the event
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// The event
    pub event: BridgeEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: BridgeEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
