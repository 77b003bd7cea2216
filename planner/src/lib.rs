//! # Planner
//!
//! Turns unstructured fashion prompts into typed queries and outfit
//! plans via the completion API, with deterministic rule-based
//! fallbacks so a flaky upstream never propagates to the caller.
//!
//! Three operations share the same shape: check cache, call the API
//! under a retry policy, strictly validate the JSON that comes back,
//! and degrade to a local computation on any failure. Parsed prompts
//! cache with a bounded TTL; outfit plans cache permanently (the
//! aesthetic-to-items space is small and stable); scores never cache.

pub mod client;
pub mod error;
pub mod fallback;
pub mod parse;
pub mod plan;
pub mod query;
pub mod score;

pub use client::{CompletionBackend, CompletionRequest, OpenAiCompletionClient};
pub use error::{PlannerError, Result};
pub use parse::PromptParser;
pub use plan::{OutfitPlan, OutfitPlanner};
pub use query::{Category, Gender, ParsedQuery, Size};
pub use score::{OutfitCandidate, OutfitItem, OutfitScorer};
