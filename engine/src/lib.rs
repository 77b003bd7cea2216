//! # Engine
//!
//! The unified entry point for the outfit recommendation core. It
//! wires the embedding generator, cache store, product store and
//! completion-backed planner into one handle and exposes each core
//! operation as a single async call returning a success payload or a
//! typed failure. The routing layer above owns HTTP concerns; nothing
//! here maps status codes or validates request shapes.
//!
//! Components are constructed once and injected by handle; there is
//! no ambient global lookup.

pub mod aesthetic;
pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;

pub use aesthetic::{AestheticCatalog, AestheticMatch, COMMON_AESTHETICS};
pub use config::EngineConfig;
pub use engine::{EmbedOutput, SearchQuery, Styledeck};
pub use error::{EngineError, Result};
pub use jobs::spawn_sweeper;
