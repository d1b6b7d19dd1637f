//! Error types for hajiri-client
//!
//! Errors are `Clone` because one in-flight GET may resolve for several
//! callers at once, each of which receives its own copy of the outcome.

use thiserror::Error;

/// Client error type
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// An attendance operation was attempted before a session exists
    #[error("No active session. Create a session first.")]
    NoActiveSession,

    /// A capture burst is already running on this controller
    #[error("A capture is already in progress")]
    CaptureInProgress,

    /// Input rejected locally, nothing was sent
    #[error("{0}")]
    Validation(String),

    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered 401; token refresh is left to the caller
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend answered with a non-success status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The backend answered 2xx but reported an error in the body
    #[error("{0}")]
    Rejected(String),

    /// The response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local resource failure (frame files, photos)
    #[error("IO error: {0}")]
    Io(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Unauthorized(_) => Some(401),
            _ => None,
        }
    }
}

impl From<hajiri_common::Error> for ClientError {
    fn from(err: hajiri_common::Error) -> Self {
        match err {
            hajiri_common::Error::Validation(msg) => ClientError::Validation(msg),
            hajiri_common::Error::Io(e) => ClientError::Io(e.to_string()),
            other => ClientError::Validation(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
