//! Storage error conversion into the core taxonomy.

use thiserror::Error;

use hydromon_core::errors::{DatabaseError, Error};

/// Errors raised inside the storage crate before conversion.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Writer unavailable: {0}")]
    Writer(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Pool(inner) => Error::Database(DatabaseError::Pool(inner.to_string())),
            other => Error::Database(DatabaseError::Internal(other.to_string())),
        }
    }
}
