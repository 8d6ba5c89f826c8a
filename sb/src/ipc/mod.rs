//! Gateway between the control process and the bridge
//!
//! Unix Domain Socket with newline-delimited JSON. The control process runs in
//! another runtime; each connection carries one [`BridgeRequest`] and receives
//! one [`BridgeResponse`]. Blocking waits run on the blocking thread pool so a
//! parked consumer never stalls the accept loop.
//!
//! A wait holds one blocking-pool thread until its barrier releases it or its
//! timeout expires, even if the client has hung up. Tokio caps the pool (512
//! threads by default), so unbounded waits are limited by that cap; set
//! `wait-timeout-ms` to bound how long an abandoned wait can hold a thread.

use std::time::Duration;

pub mod client;
pub mod listener;
pub mod messages;

pub use client::BridgeClient;
pub use listener::{cleanup_socket, create_listener_at, handle_connection, handle_connection_with, process_request, serve};
pub use messages::{BridgeRequest, BridgeResponse};

/// Largest request accepted by the listener
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// How long the listener waits for a connection to send its request line
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest response accepted by the client
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;
