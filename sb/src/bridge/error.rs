//! Bridge errors

use std::time::Duration;

use thiserror::Error;

use super::transport::TransportError;
use crate::sync::WaitError;

/// Errors surfaced to the control process
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Wait timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Submit failed: {0}")]
    Transport(#[from] TransportError),
}

impl From<WaitError> for BridgeError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::TimedOut(limit) => BridgeError::TimedOut(limit),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
