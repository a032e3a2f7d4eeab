//! Client-wide error types.
//!
//! Every failed backend call surfaces as an [`ApiError`] carrying a
//! human-readable message, the HTTP status when one was received, the raw
//! backend payload, and an [`ErrorKind`] classifying how callers should react.

use serde_json::Value;
use thiserror::Error;

/// Fallback message used when the backend gives no usable error text.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 4xx other than 401/403/429. Shown to the user as-is, never retried.
    Validation,
    /// 401 from the backend.
    Authentication,
    /// 403 from the backend. The session is kept.
    Authorization,
    /// 429 or 5xx. Retryable.
    Transient,
    /// No response within the configured bound. Retryable.
    Timeout,
    /// The body could not be parsed as JSON.
    MalformedResponse,
    /// The request never produced an HTTP status (connection refused, DNS...).
    Network,
}

impl ErrorKind {
    /// Maps a non-success HTTP status onto the error taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            429 => ErrorKind::Transient,
            500..=599 => ErrorKind::Transient,
            _ => ErrorKind::Validation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Authentication => "authentication_error",
            ErrorKind::Authorization => "authorization_error",
            ErrorKind::Transient => "transient_error",
            ErrorKind::Timeout => "timeout_error",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Network => "network_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure produced by the request executor.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub message: String,
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub payload: Option<Value>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            status: None,
            payload: None,
        }
    }

    /// Builds an error from a non-success response, pulling the message out of
    /// the payload's `message` or `error` field.
    pub fn from_response(status: u16, payload: Option<Value>) -> Self {
        let message = payload
            .as_ref()
            .and_then(|body| {
                body.get("message")
                    .and_then(Value::as_str)
                    .or_else(|| body.get("error").and_then(Value::as_str))
            })
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_ERROR_MESSAGE)
            .to_string();

        Self {
            message,
            kind: ErrorKind::from_status(status),
            status: Some(status),
            payload,
        }
    }

    pub fn timeout(endpoint: &str, after: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Request to {} timed out after {:?}", endpoint, after),
        )
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn malformed(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::MalformedResponse,
            status: Some(status),
            payload: None,
        }
    }

    /// Whether a retry sequence may issue another attempt after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Transient | ErrorKind::Timeout | ErrorKind::Network
        )
    }
}

/// Failures of the durable session store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of session operations that are not network errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No authenticated user")]
    NotAuthenticated,
    #[error("Login response did not contain a token")]
    MissingToken,
    #[error("Invalid user payload: {0}")]
    InvalidUser(#[from] serde_json::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Rejected lecture-completion events. The unlock state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("Lecture {index} does not exist (course has {total} lectures)")]
    OutOfRange { index: usize, total: usize },
    #[error("Lecture {index} is still locked")]
    Locked { index: usize },
    #[error("Course content is not available: {reason}")]
    Unavailable { reason: String },
}
