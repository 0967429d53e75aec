// Error handling module
// Defines the error taxonomy shared by the transport and API layers

use thiserror::Error;

/// Outcome of a failed token refresh.
///
/// Kept as a standalone cloneable struct (not an `ApiError` variant payload)
/// because the refresh coordinator fans one outcome out to every queued
/// waiter.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("token refresh failed: {message}")]
pub struct RefreshFailed {
    /// HTTP status returned by the refresh endpoint, if it answered at all
    pub status: Option<u16>,

    /// Human-readable cause
    pub message: String,
}

impl RefreshFailed {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Errors surfaced by client operations
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure (no connectivity, timeout, bad TLS, ...)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The 401 recovery path itself failed; the session is likely over
    #[error(transparent)]
    RefreshFailed(#[from] RefreshFailed),

    /// Rejected client-side before anything was sent
    #[error("validation error: {0}")]
    Validation(String),

    /// Non-2xx answer from the Paragraphs API, surfaced verbatim
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Anything else
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Status code of the server answer, when the error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            ApiError::RefreshFailed(e) => e.status,
            _ => None,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;
