//! Outbound transport seam
//!
//! The bridge hands submitted messages to a [`Transport`] and does not track
//! them afterwards. Delivery guarantees belong to the transport.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::Envelope;

/// Errors from handing a message to the transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Transport rejected message: {0}")]
    Rejected(String),
}

/// Something that can carry outgoing messages to the server
pub trait Transport: Send + Sync {
    fn send(&self, envelope: Envelope) -> Result<(), TransportError>;
}

/// Transport backed by an unbounded tokio channel
///
/// Sending never blocks and works from any thread. The receiving half belongs
/// to whatever forwards messages to the server.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        debug!(message_type = %envelope.message_type, "ChannelTransport::send: called");
        self.tx.send(envelope).map_err(|_| TransportError::Closed)
    }
}
