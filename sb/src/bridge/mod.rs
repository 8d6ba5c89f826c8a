//! Control bridge
//!
//! Composes the session-start rendezvous, the period barrier and the message
//! exchange behind one facade, and forwards outgoing messages to a transport.

mod control;
mod error;
mod transport;

pub use control::{BridgeOptions, ControlBridge};
pub use error::{BridgeError, BridgeResult};
pub use transport::{ChannelTransport, Transport, TransportError};
