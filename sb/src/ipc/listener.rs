//! Gateway listener
//!
//! Binds the Unix socket, reads one request per connection and answers it from
//! the bridge.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{MAX_REQUEST_SIZE, REQUEST_READ_TIMEOUT};
use super::messages::{BridgeRequest, BridgeResponse};
use crate::bridge::{BridgeError, BridgeResult, ControlBridge};

/// Create and bind the gateway socket
///
/// Handles cleanup of stale socket files from previous runs.
pub fn create_listener_at(socket_path: &Path) -> Result<UnixListener> {
    debug!(?socket_path, "create_listener_at: creating gateway socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener_at: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind gateway socket")?;
    debug!(?socket_path, "create_listener_at: socket bound successfully");
    Ok(listener)
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Read one request line, refusing anything over the size cap
pub async fn read_request(stream: &mut UnixStream) -> Result<BridgeRequest> {
    let mut reader = BufReader::new(stream).take(MAX_REQUEST_SIZE as u64 + 1);
    let mut line = String::new();

    let bytes_read = reader.read_line(&mut line).await.context("Failed to read request")?;

    if bytes_read > MAX_REQUEST_SIZE {
        return Err(eyre::eyre!("Request too large: more than {} bytes", MAX_REQUEST_SIZE));
    }

    if line.trim().is_empty() {
        return Err(eyre::eyre!("Empty request received"));
    }

    let request: BridgeRequest = serde_json::from_str(line.trim()).context("Failed to parse request")?;
    debug!(?request, "read_request: parsed request");
    Ok(request)
}

/// Send a response on the stream
pub async fn send_response(stream: &mut UnixStream, response: &BridgeResponse) -> Result<()> {
    let response_json = serde_json::to_string(response).context("Failed to serialize response")?;
    stream
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write response")?;
    stream.write_all(b"\n").await.context("Failed to write newline")?;
    stream.flush().await.context("Failed to flush response")?;
    debug!(bytes = response_json.len(), "send_response: sent response");
    Ok(())
}

/// Serve one connection: read a request, answer it, close
pub async fn handle_connection(stream: UnixStream, bridge: Arc<ControlBridge>) -> Result<()> {
    handle_connection_with(stream, bridge, REQUEST_READ_TIMEOUT).await
}

/// Like [`handle_connection`], giving up on the request after `read_timeout`
///
/// An idle client gets an error response instead of holding its task open.
pub async fn handle_connection_with(
    mut stream: UnixStream,
    bridge: Arc<ControlBridge>,
    read_timeout: Duration,
) -> Result<()> {
    let request = match tokio::time::timeout(read_timeout, read_request(&mut stream)).await {
        Ok(result) => result,
        Err(_) => Err(eyre::eyre!("Request read timed out after {:?}", read_timeout)),
    };
    let response = match request {
        Ok(request) => process_request(&bridge, request).await,
        Err(e) => {
            warn!(error = %e, "handle_connection: bad request");
            BridgeResponse::Error {
                message: format!("{:#}", e),
            }
        }
    };
    send_response(&mut stream, &response).await
}

/// Answer a request from the bridge
pub async fn process_request(bridge: &Arc<ControlBridge>, request: BridgeRequest) -> BridgeResponse {
    match request {
        BridgeRequest::AwaitSessionStart { timeout_ms } => {
            let timeout = resolve_timeout(bridge, timeout_ms);
            let bridge = Arc::clone(bridge);
            run_wait(move || {
                bridge
                    .await_session_start_timeout(timeout)
                    .map(|()| BridgeResponse::Ok)
            })
            .await
        }
        BridgeRequest::AwaitPeriodComplete { after, timeout_ms } => {
            let timeout = resolve_timeout(bridge, timeout_ms);
            let bridge = Arc::clone(bridge);
            run_wait(move || {
                bridge
                    .await_period_complete_timeout(after, timeout)
                    .map(|period| BridgeResponse::Period { period })
            })
            .await
        }
        BridgeRequest::TakeMessages { period } => BridgeResponse::Messages {
            messages: bridge.take_messages(period),
        },
        BridgeRequest::Submit { message } => match bridge.submit(message) {
            Ok(()) => BridgeResponse::Ok,
            Err(e) => BridgeResponse::Error { message: e.to_string() },
        },
        BridgeRequest::LogTest { text } => {
            bridge.log_test(&text);
            BridgeResponse::Ok
        }
    }
}

fn resolve_timeout(bridge: &ControlBridge, timeout_ms: Option<u64>) -> Option<Duration> {
    timeout_ms.map(Duration::from_millis).or(bridge.default_wait_timeout())
}

/// Run a blocking wait off the async workers
///
/// The blocking thread is held until the wait returns, whether or not the
/// client is still connected.
async fn run_wait<F>(wait: F) -> BridgeResponse
where
    F: FnOnce() -> BridgeResult<BridgeResponse> + Send + 'static,
{
    match tokio::task::spawn_blocking(wait).await {
        Ok(Ok(response)) => response,
        Ok(Err(BridgeError::TimedOut(limit))) => BridgeResponse::TimedOut {
            waited_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        },
        Ok(Err(e)) => BridgeResponse::Error { message: e.to_string() },
        Err(e) => BridgeResponse::Error {
            message: format!("Wait task failed: {}", e),
        },
    }
}

/// Accept connections until a shutdown signal arrives
pub async fn serve(listener: UnixListener, bridge: Arc<ControlBridge>, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
    info!(session_id = %bridge.session_id(), "Gateway accepting connections");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        debug!("serve: connection accepted");
                        let bridge = Arc::clone(&bridge);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, bridge).await {
                                warn!(error = %e, "serve: connection error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "serve: accept error");
                    }
                }
            }

            _ = shutdown_rx.recv() => {
                debug!("serve: shutdown signal received");
                info!("Gateway shutting down");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeOptions, ChannelTransport};
    use crate::domain::{Envelope, MessageType};
    use crate::events::EventEmitter;
    use serde_json::json;
    use tempfile::TempDir;

    fn bridge(options: BridgeOptions) -> (Arc<ControlBridge>, tokio::sync::mpsc::UnboundedReceiver<Envelope>) {
        let (transport, rx) = ChannelTransport::new();
        let bridge = ControlBridge::new(options, Arc::new(transport), EventEmitter::detached("test"));
        (Arc::new(bridge), rx)
    }

    #[tokio::test]
    async fn test_create_listener_creates_parent_dir() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("subdir").join("bridge.sock");

        assert!(create_listener_at(&socket_path).is_ok());
        assert!(socket_path.exists());
    }

    #[tokio::test]
    async fn test_create_listener_removes_stale_socket() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("bridge.sock");
        std::fs::write(&socket_path, "stale").unwrap();

        assert!(create_listener_at(&socket_path).is_ok());
    }

    #[test]
    fn test_cleanup_socket_removes_file() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("bridge.sock");
        std::fs::write(&socket_path, "test").unwrap();

        cleanup_socket(&socket_path);
        assert!(!socket_path.exists());
    }

    #[test]
    fn test_cleanup_socket_handles_missing_file() {
        let temp = TempDir::new().unwrap();
        cleanup_socket(&temp.path().join("nonexistent.sock"));
    }

    #[tokio::test]
    async fn test_process_take_and_submit() {
        let (bridge, mut outbound) = bridge(BridgeOptions::default());
        bridge.ingest(2, Envelope::new("ClearedTrade", json!({"price": 40})));

        let resp = process_request(&bridge, BridgeRequest::TakeMessages { period: 2 }).await;
        match resp {
            BridgeResponse::Messages { messages } => {
                assert_eq!(messages.many(&MessageType::ClearedTrade).len(), 1);
            }
            other => panic!("Expected Messages, got {:?}", other),
        }

        let resp = process_request(
            &bridge,
            BridgeRequest::Submit {
                message: Envelope::new("Order", json!({"mwh": 1.0})),
            },
        )
        .await;
        assert_eq!(resp, BridgeResponse::Ok);
        assert_eq!(outbound.recv().await.unwrap().message_type, MessageType::Order);
    }

    #[tokio::test]
    async fn test_process_wait_times_out() {
        let (bridge, _outbound) = bridge(BridgeOptions::default());
        let resp = process_request(
            &bridge,
            BridgeRequest::AwaitPeriodComplete {
                after: 0,
                timeout_ms: Some(20),
            },
        )
        .await;
        assert_eq!(resp, BridgeResponse::TimedOut { waited_ms: 20 });
    }

    #[tokio::test]
    async fn test_process_wait_uses_default_timeout() {
        let (bridge, _outbound) = bridge(BridgeOptions {
            wait_timeout: Some(Duration::from_millis(15)),
            ..Default::default()
        });
        let resp = process_request(&bridge, BridgeRequest::AwaitSessionStart { timeout_ms: None }).await;
        assert_eq!(resp, BridgeResponse::TimedOut { waited_ms: 15 });
    }

    #[tokio::test]
    async fn test_process_submit_on_closed_transport() {
        let (bridge, outbound) = bridge(BridgeOptions::default());
        drop(outbound);
        let resp = process_request(
            &bridge,
            BridgeRequest::Submit {
                message: Envelope::new("Order", json!({})),
            },
        )
        .await;
        assert!(matches!(resp, BridgeResponse::Error { .. }));
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error_response() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("bridge.sock");
        let listener = create_listener_at(&socket_path).unwrap();
        let (bridge, _outbound) = bridge(BridgeOptions::default());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_connection(stream, bridge).await.unwrap();
        });

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        stream.write_all(b"{\"type\":\"Nope\"}\n").await.unwrap();
        let mut line = String::new();
        BufReader::new(&mut stream).read_line(&mut line).await.unwrap();

        let resp: BridgeResponse = serde_json::from_str(line.trim()).unwrap();
        assert!(matches!(resp, BridgeResponse::Error { .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_connection_gets_timeout_response() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("bridge.sock");
        let listener = create_listener_at(&socket_path).unwrap();
        let (bridge, _outbound) = bridge(BridgeOptions::default());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_connection_with(stream, bridge, Duration::from_millis(50))
                .await
                .unwrap();
        });

        // Connect and never send a request
        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(5), BufReader::new(&mut stream).read_line(&mut line))
            .await
            .unwrap()
            .unwrap();

        let resp: BridgeResponse = serde_json::from_str(line.trim()).unwrap();
        match resp {
            BridgeResponse::Error { message } => assert!(message.contains("timed out")),
            other => panic!("Expected Error, got {:?}", other),
        }
        server.await.unwrap();
    }
}
