//! Error types shared across the core crate.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Internal database error: {0}")]
    Internal(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Corrupt record: {0}")]
    Corruption(String),
}

/// Top-level error for core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Persistence failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rejected input at the ingest boundary
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
