//! PeriodBucket - everything that arrived for one period
//!
//! On the wire a bucket is a JSON object keyed by type name. Singleton types map
//! to their payload, repeating types map to an array in arrival order:
//!
//! ```text
//! {"CashPosition": {"balance": 120.0}, "ClearedTrade": [{"id": "a"}, {"id": "b"}]}
//! ```

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

use super::message::{Envelope, MessageKind, MessageType};

/// Stored value(s) for one message type within a period
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Slot {
    Single(Value),
    Many(Vec<Value>),
}

impl Slot {
    /// Number of payloads held
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of putting one envelope into a bucket
#[derive(Debug, Clone, PartialEq)]
pub enum PutResult {
    /// First value for a singleton type
    Stored,
    /// Added to the end of a repeating type's list
    Appended,
    /// Replaced an earlier singleton value, which is returned
    Replaced(Value),
}

/// Mapping from message type to its stored value(s) for a single period
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<MessageType, Value>")]
pub struct PeriodBucket {
    slots: BTreeMap<MessageType, Slot>,
}

impl PeriodBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an envelope according to its type's kind
    pub fn put(&mut self, envelope: Envelope) -> PutResult {
        let Envelope { message_type, payload } = envelope;
        match message_type.kind() {
            MessageKind::Singleton => match self.slots.insert(message_type, Slot::Single(payload)) {
                Some(Slot::Single(previous)) => PutResult::Replaced(previous),
                // A Many slot for a singleton type can only come from a hand-built bucket
                Some(Slot::Many(_)) | None => PutResult::Stored,
            },
            MessageKind::Repeating => {
                let values = match self.slots.remove(&message_type) {
                    Some(Slot::Many(mut values)) => {
                        values.push(payload);
                        values
                    }
                    Some(Slot::Single(first)) => vec![first, payload],
                    None => vec![payload],
                };
                self.slots.insert(message_type, Slot::Many(values));
                PutResult::Appended
            }
        }
    }

    pub fn get(&self, message_type: &MessageType) -> Option<&Slot> {
        self.slots.get(message_type)
    }

    /// Singleton value for a type, if present
    pub fn single(&self, message_type: &MessageType) -> Option<&Value> {
        match self.slots.get(message_type) {
            Some(Slot::Single(value)) => Some(value),
            _ => None,
        }
    }

    /// Repeating values for a type; empty when none arrived
    pub fn many(&self, message_type: &MessageType) -> &[Value] {
        match self.slots.get(message_type) {
            Some(Slot::Many(values)) => values,
            _ => &[],
        }
    }

    /// True when no message of any type is held
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of distinct message types held
    pub fn type_count(&self) -> usize {
        self.slots.len()
    }

    /// Total number of payloads across all types
    pub fn message_count(&self) -> usize {
        self.slots.values().map(Slot::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MessageType, &Slot)> {
        self.slots.iter()
    }

    pub fn into_inner(self) -> BTreeMap<MessageType, Slot> {
        self.slots
    }
}

impl Serialize for PeriodBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.slots.iter())
    }
}

impl TryFrom<BTreeMap<MessageType, Value>> for PeriodBucket {
    type Error = String;

    fn try_from(raw: BTreeMap<MessageType, Value>) -> Result<Self, Self::Error> {
        let mut slots = BTreeMap::new();
        for (message_type, value) in raw {
            let slot = match (message_type.kind(), value) {
                (MessageKind::Singleton, value) => Slot::Single(value),
                (MessageKind::Repeating, Value::Array(values)) => Slot::Many(values),
                (MessageKind::Repeating, other) => {
                    return Err(format!("expected a list for {}, got {}", message_type, other));
                }
            };
            slots.insert(message_type, slot);
        }
        Ok(Self { slots })
    }
}
