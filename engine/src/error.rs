//! Error types for the engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Caller input violates a precondition. Surfaced immediately,
    /// never retried.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration is missing or unparseable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Embedding generation failed.
    #[error(transparent)]
    Embedding(#[from] styledeck_embeddings::EmbeddingError),

    /// Relational store failed.
    #[error(transparent)]
    Store(#[from] styledeck_store::StoreError),

    /// Completion-backed operation failed without a fallback.
    #[error(transparent)]
    Planner(#[from] styledeck_planner::PlannerError),
}
