//! Crate-wide error taxonomy.
//!
//! Every failure falls into one of four buckets: policy rejection,
//! transient unavailability, validation failure, or resource-not-found.
//! Only the transient bucket is ever retried.

use crate::capture::{CaptureError, CropError};
use crate::protocol::ValidationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Blocked by host policy: {0}")]
    Policy(String),

    #[error("Target not ready: {0}")]
    Unavailable(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid message: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unauthorized sender: {0}")]
    Unauthorized(String),

    #[error("Unrecognized message type: {0}")]
    Unrecognized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error("Storage failed: {0}")]
    Storage(String),

    #[error("Host call failed: {0}")]
    Host(String),

    #[error("Peer replied with {kind:?}: {message}")]
    Remote { kind: ErrorKind, message: String },
}

/// Wire-level error classification carried in error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    Unrecognized,
    Invalid,
    Policy,
    Unavailable,
    NotFound,
    Timeout,
    Internal,
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Policy(_) => ErrorKind::Policy,
            RelayError::Unavailable(_) => ErrorKind::Unavailable,
            RelayError::Timeout(_) => ErrorKind::Timeout,
            RelayError::Validation(_) | RelayError::Crop(_) => ErrorKind::Invalid,
            RelayError::Unauthorized(_) => ErrorKind::Unauthorized,
            RelayError::Unrecognized(_) => ErrorKind::Unrecognized,
            RelayError::NotFound(_) => ErrorKind::NotFound,
            RelayError::Capture(_) | RelayError::Storage(_) | RelayError::Host(_) => {
                ErrorKind::Internal
            }
            RelayError::Remote { kind, .. } => *kind,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unavailable | ErrorKind::Timeout)
    }
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;
