//! # Embeddings
//!
//! CLIP-style embedding generation for fashion text and imagery.
//!
//! The [`EmbeddingGenerator`] wraps an [`encoder::EncoderBackend`]
//! (an HTTP inference server in production) and guarantees that every
//! vector leaving this crate is 512-dimensional and L2-normalized.
//! Batch image encoding downloads concurrently under a bounded pool
//! and reports a per-slot outcome, so one bad image never aborts a
//! batch and indices always line up with the request list.
//!
//! [`similarity`] carries the vector math: cosine similarity, top-k
//! ranking over in-memory candidates, and the outfit coherence score.

pub mod encoder;
pub mod error;
pub mod generator;
pub mod similarity;

pub use encoder::{ClipHttpEncoder, EncoderBackend};
pub use error::{EmbeddingError, Result};
pub use generator::{BatchOutput, EmbeddingGenerator, ImageSlot};
pub use similarity::{SimilarityResult, coherence, cosine_similarity};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of all embeddings produced by this crate (CLIP ViT-B/32).
pub const EMBEDDING_DIM: usize = 512;
