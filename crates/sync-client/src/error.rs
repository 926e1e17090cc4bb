//! Error types for the sync client crate.

use thiserror::Error;

use hydromon_core::sync::{classify_http_status, SyncRetryClass};

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, SyncClientError>;

/// Errors that can occur while talking to the aggregation service.
#[derive(Debug, Error)]
pub enum SyncClientError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP 200 carrying an in-band `status: "error"` body
    #[error("Rejected by service: {0}")]
    Rejected(String),

    /// Invalid request (bad record id, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SyncClientError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Api { status, .. } => classify_http_status(*status),
            Self::Http(_) => SyncRetryClass::Retryable,
            Self::Json(_) => SyncRetryClass::Permanent,
            Self::Rejected(_) => SyncRetryClass::Permanent,
            Self::InvalidRequest(_) => SyncRetryClass::Permanent,
        }
    }
}
