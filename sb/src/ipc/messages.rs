//! Gateway message types
//!
//! JSON-over-newline protocol. Each request and response is a single line of
//! JSON followed by `\n`, one request per connection.

use serde::{Deserialize, Serialize};

use crate::domain::{Envelope, PeriodBucket, PeriodIndex};

/// Requests from the control process to the bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BridgeRequest {
    /// Block until the session has started
    AwaitSessionStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Block until a period newer than `after` completes
    AwaitPeriodComplete {
        after: PeriodIndex,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Drain the messages for one period
    TakeMessages { period: PeriodIndex },

    /// Send a message to the server
    Submit { message: Envelope },

    /// Write a line to the bridge log
    LogTest { text: String },
}

/// Responses from the bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BridgeResponse {
    Ok,

    Period { period: PeriodIndex },

    Messages { messages: PeriodBucket },

    /// A bounded wait expired
    TimedOut { waited_ms: u64 },

    Error { message: String },
}
