//! Inbound message vocabulary

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{MessageType, PeriodIndex};

/// One message from the event source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    SimStart,

    SimEnd {
        #[serde(default)]
        payload: Value,
    },

    /// The event source moved to a new period
    TimeslotUpdate { period: PeriodIndex },

    /// No more messages will arrive for `period`
    TimeslotComplete { period: PeriodIndex },

    /// Any stored message kind
    Data { message_type: MessageType, payload: Value },
}

impl InboundMessage {
    pub fn data(message_type: impl Into<MessageType>, payload: Value) -> Self {
        Self::Data {
            message_type: message_type.into(),
            payload,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::SimStart => "SimStart",
            Self::SimEnd { .. } => "SimEnd",
            Self::TimeslotUpdate { .. } => "TimeslotUpdate",
            Self::TimeslotComplete { .. } => "TimeslotComplete",
            Self::Data { message_type, .. } => message_type.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_lines() {
        let start: InboundMessage = serde_json::from_str(r#"{"type":"SimStart"}"#).unwrap();
        assert_eq!(start, InboundMessage::SimStart);

        let end: InboundMessage = serde_json::from_str(r#"{"type":"SimEnd"}"#).unwrap();
        assert_eq!(end, InboundMessage::SimEnd { payload: Value::Null });

        let complete: InboundMessage = serde_json::from_str(r#"{"type":"TimeslotComplete","period":7}"#).unwrap();
        assert_eq!(complete, InboundMessage::TimeslotComplete { period: 7 });

        let data: InboundMessage =
            serde_json::from_str(r#"{"type":"Data","message_type":"CashPosition","payload":{"balance":1.5}}"#).unwrap();
        assert_eq!(data, InboundMessage::data("CashPosition", json!({"balance": 1.5})));
        assert_eq!(data.name(), "CashPosition");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<InboundMessage, _> = serde_json::from_str(r#"{"type":"Bogus"}"#);
        assert!(result.is_err());
    }
}
