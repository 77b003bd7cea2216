//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Encoder failed to initialize. Surfaces on first use, not at
    /// process start, and is not retried by the generator itself.
    #[error("encoder model unavailable: {0}")]
    ModelUnavailable(String),

    /// Encoder unreachable, timed out, or returned a failure status.
    #[error("encoder upstream unavailable: {0}")]
    Upstream(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Encoder returned data violating the expected contract.
    #[error("malformed encoder response: {0}")]
    MalformedResponse(String),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Fetching raw image bytes failed.
    #[error("image fetch failed for {url}: {reason}")]
    ImageFetch { url: String, reason: String },
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::Upstream(err.to_string())
    }
}
