//! Error types for the planner.

use thiserror::Error;

/// Result type alias for planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

/// Errors that can occur while talking to the completion API.
#[derive(Error, Debug)]
pub enum PlannerError {
    /// Completion API unreachable, timed out, or returned a failure
    /// status.
    #[error("completion upstream unavailable: {0}")]
    Upstream(String),

    /// The API returned data violating the expected contract: invalid
    /// JSON, a missing field, or a constraint violation such as an
    /// out-of-range item count.
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    /// Caller input violates a precondition. Surfaced immediately,
    /// never retried.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl From<reqwest::Error> for PlannerError {
    fn from(err: reqwest::Error) -> Self {
        PlannerError::Upstream(err.to_string())
    }
}
