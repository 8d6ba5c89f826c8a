//! Message vocabulary
//!
//! Every message that reaches the exchange carries a [`MessageType`]. The type
//! decides whether a period holds one value for it or an ordered list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// How a message type is stored within a single period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// At most one per period; a later value replaces an earlier one
    Singleton,
    /// Any number per period, kept in arrival order
    Repeating,
}

/// Semantic tag of a message
///
/// Serialized as its bare name (`"CashPosition"`), which makes it usable as a
/// JSON object key. Names that are not known to the crate round-trip through
/// [`MessageType::Other`] and are treated as repeating.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum MessageType {
    // Context messages
    CashPosition,
    Competition,
    CustomerBootstrapData,
    MarketBootstrapData,
    Properties,
    DistributionReport,
    SimEnd,
    BankTransaction,
    WeatherReport,
    WeatherForecast,

    // Market messages
    BalancingTransaction,
    ClearedTrade,
    DistributionTransaction,
    CapacityTransaction,
    MarketPosition,
    MarketTransaction,
    Orderbook,
    BalanceReport,

    // Outgoing messages
    Order,
    TariffSpecification,

    /// Any type name the crate has no built-in knowledge of
    Other(String),
}

impl MessageType {
    /// Storage policy for this type
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::CashPosition
            | Self::Competition
            | Self::CustomerBootstrapData
            | Self::MarketBootstrapData
            | Self::Properties
            | Self::DistributionReport
            | Self::SimEnd => MessageKind::Singleton,
            _ => MessageKind::Repeating,
        }
    }

    /// Wire name of this type
    pub fn as_str(&self) -> &str {
        match self {
            Self::CashPosition => "CashPosition",
            Self::Competition => "Competition",
            Self::CustomerBootstrapData => "CustomerBootstrapData",
            Self::MarketBootstrapData => "MarketBootstrapData",
            Self::Properties => "Properties",
            Self::DistributionReport => "DistributionReport",
            Self::SimEnd => "SimEnd",
            Self::BankTransaction => "BankTransaction",
            Self::WeatherReport => "WeatherReport",
            Self::WeatherForecast => "WeatherForecast",
            Self::BalancingTransaction => "BalancingTransaction",
            Self::ClearedTrade => "ClearedTrade",
            Self::DistributionTransaction => "DistributionTransaction",
            Self::CapacityTransaction => "CapacityTransaction",
            Self::MarketPosition => "MarketPosition",
            Self::MarketTransaction => "MarketTransaction",
            Self::Orderbook => "Orderbook",
            Self::BalanceReport => "BalanceReport",
            Self::Order => "Order",
            Self::TariffSpecification => "TariffSpecification",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for MessageType {
    fn from(name: &str) -> Self {
        match name {
            "CashPosition" => Self::CashPosition,
            "Competition" => Self::Competition,
            "CustomerBootstrapData" => Self::CustomerBootstrapData,
            "MarketBootstrapData" => Self::MarketBootstrapData,
            "Properties" => Self::Properties,
            "DistributionReport" => Self::DistributionReport,
            "SimEnd" => Self::SimEnd,
            "BankTransaction" => Self::BankTransaction,
            "WeatherReport" => Self::WeatherReport,
            "WeatherForecast" => Self::WeatherForecast,
            "BalancingTransaction" => Self::BalancingTransaction,
            "ClearedTrade" => Self::ClearedTrade,
            "DistributionTransaction" => Self::DistributionTransaction,
            "CapacityTransaction" => Self::CapacityTransaction,
            "MarketPosition" => Self::MarketPosition,
            "MarketTransaction" => Self::MarketTransaction,
            "Orderbook" => Self::Orderbook,
            "BalanceReport" => Self::BalanceReport,
            "Order" => Self::Order,
            "TariffSpecification" => Self::TariffSpecification,
            other => {
                debug!(%other, "MessageType::from: unknown type name");
                Self::Other(other.to_string())
            }
        }
    }
}

impl From<String> for MessageType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<MessageType> for String {
    fn from(message_type: MessageType) -> Self {
        match message_type {
            MessageType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload together with its type tag
///
/// The payload is opaque to this crate. Ownership moves from the producer into
/// the exchange and from there to whoever drains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_type: MessageType,
    pub payload: Value,
}

impl Envelope {
    pub fn new(message_type: impl Into<MessageType>, payload: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
        }
    }
}
