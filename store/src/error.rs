//! Error types for the store.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur against the relational store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store unreachable, timed out, or rejected the operation.
    /// Callers retry per the datastore policy, then surface this.
    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    /// A persisted vector literal failed to parse.
    #[error("malformed vector literal: {0}")]
    MalformedVector(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}
