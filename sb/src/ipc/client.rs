//! Gateway client
//!
//! One async method per bridge operation. Each call opens a connection, sends
//! one request and reads one response.

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::messages::{BridgeRequest, BridgeResponse};
use super::{MAX_REQUEST_SIZE, MAX_RESPONSE_SIZE};
use crate::bridge::BridgeError;
use crate::config::default_socket_path;
use crate::domain::{Envelope, PeriodBucket, PeriodIndex};

/// Default timeout for connecting, writing and non-blocking reads
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the bridge gateway
#[derive(Debug, Clone)]
pub struct BridgeClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for BridgeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeClient {
    pub fn new() -> Self {
        Self::with_socket_path(default_socket_path())
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the I/O timeout; waits are bounded separately
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Block until the session has started
    ///
    /// A timed-out wait fails with [`BridgeError::TimedOut`].
    pub async fn await_session_start(&self, timeout: Option<Duration>) -> Result<()> {
        debug!(?timeout, "BridgeClient: await_session_start");
        let request = BridgeRequest::AwaitSessionStart {
            timeout_ms: timeout.map(millis),
        };
        match self.send_request(request, ReadBound::Wait(timeout)).await? {
            BridgeResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Block until a period newer than `after` completes
    pub async fn await_period_complete(&self, after: PeriodIndex, timeout: Option<Duration>) -> Result<PeriodIndex> {
        debug!(after, ?timeout, "BridgeClient: await_period_complete");
        let request = BridgeRequest::AwaitPeriodComplete {
            after,
            timeout_ms: timeout.map(millis),
        };
        match self.send_request(request, ReadBound::Wait(timeout)).await? {
            BridgeResponse::Period { period } => Ok(period),
            other => Err(unexpected(other)),
        }
    }

    pub async fn take_messages(&self, period: PeriodIndex) -> Result<PeriodBucket> {
        debug!(period, "BridgeClient: take_messages");
        match self
            .send_request(BridgeRequest::TakeMessages { period }, ReadBound::Io)
            .await?
        {
            BridgeResponse::Messages { messages } => Ok(messages),
            other => Err(unexpected(other)),
        }
    }

    pub async fn submit(&self, message: Envelope) -> Result<()> {
        debug!(message_type = %message.message_type, "BridgeClient: submit");
        match self.send_request(BridgeRequest::Submit { message }, ReadBound::Io).await? {
            BridgeResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn log_test(&self, text: &str) -> Result<()> {
        debug!("BridgeClient: log_test");
        let request = BridgeRequest::LogTest { text: text.to_string() };
        match self.send_request(request, ReadBound::Io).await? {
            BridgeResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn send_request(&self, request: BridgeRequest, bound: ReadBound) -> Result<BridgeResponse> {
        debug!(?self.socket_path, "BridgeClient: sending request");

        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to bridge socket")?;

        self.send_on_stream(stream, request, bound).await
    }

    async fn send_on_stream(&self, mut stream: UnixStream, request: BridgeRequest, bound: ReadBound) -> Result<BridgeResponse> {
        let request_json = serde_json::to_string(&request).context("Failed to serialize request")?;

        if request_json.len() > MAX_REQUEST_SIZE {
            return Err(eyre::eyre!("Request too large: {} bytes", request_json.len()));
        }

        tokio::time::timeout(self.timeout, async {
            stream
                .write_all(request_json.as_bytes())
                .await
                .context("Failed to write request")?;
            stream.write_all(b"\n").await.context("Failed to write newline")?;
            stream.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")??;

        let mut reader = BufReader::new(&mut stream).take(MAX_RESPONSE_SIZE as u64 + 1);
        let mut response_line = String::new();
        let read = async {
            let bytes_read = reader
                .read_line(&mut response_line)
                .await
                .context("Failed to read response")?;

            if bytes_read > MAX_RESPONSE_SIZE {
                return Err(eyre::eyre!("Response too large: more than {} bytes", MAX_RESPONSE_SIZE));
            }

            Ok::<_, eyre::Error>(())
        };

        match bound.limit(self.timeout) {
            Some(limit) => tokio::time::timeout(limit, read).await.context("Read timeout")??,
            None => read.await?,
        }

        let response: BridgeResponse =
            serde_json::from_str(response_line.trim()).context("Failed to parse bridge response")?;
        debug!("BridgeClient: received response");

        match response {
            BridgeResponse::TimedOut { waited_ms } => Err(BridgeError::TimedOut(Duration::from_millis(waited_ms)).into()),
            BridgeResponse::Error { message } => Err(eyre::eyre!("Bridge error: {}", message)),
            other => Ok(other),
        }
    }
}

/// How long to wait for the response line
#[derive(Debug, Clone, Copy)]
enum ReadBound {
    /// Plain request; answered promptly
    Io,
    /// Blocking wait on the bridge; unbounded unless the wait itself is
    Wait(Option<Duration>),
}

impl ReadBound {
    fn limit(self, io_timeout: Duration) -> Option<Duration> {
        match self {
            ReadBound::Io => Some(io_timeout),
            ReadBound::Wait(wait) => wait.map(|w| w + io_timeout),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn unexpected(response: BridgeResponse) -> eyre::Error {
    eyre::eyre!("Unexpected response: {:?}", response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_client_default() {
        let client = BridgeClient::default();
        assert!(client.socket_path.ends_with("bridge.sock"));
    }

    #[test]
    fn test_client_with_custom_path() {
        let path = PathBuf::from("/custom/path/bridge.sock");
        let client = BridgeClient::with_socket_path(path.clone());
        assert_eq!(client.socket_path, path);
    }

    #[test]
    fn test_client_with_timeout() {
        let client = BridgeClient::new().with_timeout(Duration::from_secs(10));
        assert_eq!(client.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_socket_exists_false() {
        let temp = TempDir::new().unwrap();
        let client = BridgeClient::with_socket_path(temp.path().join("nonexistent.sock"));
        assert!(!client.socket_exists());
    }

    #[test]
    fn test_read_bounds() {
        let io = Duration::from_secs(5);
        assert_eq!(ReadBound::Io.limit(io), Some(io));
        assert_eq!(ReadBound::Wait(None).limit(io), None);
        assert_eq!(
            ReadBound::Wait(Some(Duration::from_secs(1))).limit(io),
            Some(Duration::from_secs(6))
        );
    }

    #[tokio::test]
    async fn test_connect_to_missing_socket_fails() {
        let temp = TempDir::new().unwrap();
        let client = BridgeClient::with_socket_path(temp.path().join("missing.sock"));
        assert!(client.log_test("hi").await.is_err());
    }
}
