//! Precomputed aesthetic reference vectors.
//!
//! A small catalog of known style labels, each with a text embedding
//! persisted permanently in the cache store. Precomputation runs as a
//! batch job; classification reads whatever references exist and
//! never writes.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use styledeck_cache::{CacheStore, key};
use styledeck_embeddings::{Embedding, EmbeddingError, EmbeddingGenerator, similarity};

/// Style labels the catalog precomputes references for.
pub const COMMON_AESTHETICS: &[&str] = &[
    "Korean Minimal",
    "Streetwear",
    "Y2K",
    "Vintage",
    "Athleisure",
    "Office Wear",
    "Boho",
    "Cottagecore",
    "Dark Academia",
    "Grunge",
    "Preppy",
    "Cyberpunk",
    "Techwear",
    "Gorpcore",
    "Old Money",
    "Quiet Luxury",
    "E-Girl",
    "E-Boy",
    "Soft Girl",
    "Indie Sleaze",
    "Normcore",
    "Minimalism",
    "Maximalism",
    "Avant Garde",
    "Harajuku",
    "Punk",
    "Rocker",
    "Western",
    "Safari",
    "Nautical",
];

/// The closest known aesthetic to a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct AestheticMatch {
    /// Display label of the winning aesthetic.
    pub label: String,

    /// Cosine similarity between the prompt and the reference.
    pub similarity: f32,
}

/// Manages aesthetic reference embeddings in the cache store.
pub struct AestheticCatalog {
    generator: Arc<EmbeddingGenerator>,
    cache: Arc<CacheStore>,
}

impl AestheticCatalog {
    /// Create a catalog over the given generator and cache store.
    pub fn new(generator: Arc<EmbeddingGenerator>, cache: Arc<CacheStore>) -> Self {
        Self { generator, cache }
    }

    /// Encode every known aesthetic and persist each reference
    /// permanently, overwriting wholesale. One label's failure is
    /// logged and skipped. Returns the number persisted.
    pub async fn precompute(&self) -> usize {
        info!(
            "precomputing reference vectors for {} aesthetics",
            COMMON_AESTHETICS.len()
        );

        let mut count = 0;
        for label in COMMON_AESTHETICS {
            match self.generator.encode_text(label).await {
                Ok(embedding) => {
                    let Ok(serialized) = serde_json::to_string(&embedding) else {
                        continue;
                    };
                    self.cache
                        .set_permanent(&key::aesthetic_key(label), &serialized)
                        .await;
                    count += 1;
                    debug!("computed reference vector for: {label}");
                }
                Err(err) => {
                    error!("failed to compute reference vector for {label}: {err}");
                }
            }
        }

        info!(
            "aesthetic precomputation complete: {count}/{} persisted",
            COMMON_AESTHETICS.len()
        );
        count
    }

    /// Every stored reference as `(label, embedding)`. Corrupt or
    /// wrong-dimension entries are skipped.
    pub async fn all(&self) -> Vec<(String, Embedding)> {
        let mut references = Vec::new();

        for cache_key in self.cache.keys(&key::aesthetic_pattern()).await {
            let Some(raw) = self.cache.get(&cache_key).await else {
                continue;
            };
            let Some(label) = key::aesthetic_label(&cache_key) else {
                continue;
            };

            match serde_json::from_str::<Embedding>(&raw) {
                Ok(embedding) if embedding.len() == self.generator.dimension() => {
                    references.push((label, embedding));
                }
                Ok(embedding) => {
                    warn!(
                        "skipping reference {label}: dimension {} != {}",
                        embedding.len(),
                        self.generator.dimension()
                    );
                }
                Err(err) => {
                    warn!("skipping corrupt reference {label}: {err}");
                }
            }
        }

        references
    }

    /// The single closest reference to `prompt`, or `None` when no
    /// references exist. Ties break on iteration order; floating-point
    /// ties are improbable enough for that to be acceptable.
    pub async fn nearest(
        &self,
        prompt: &str,
    ) -> std::result::Result<Option<AestheticMatch>, EmbeddingError> {
        let references = self.all().await;
        if references.is_empty() {
            return Ok(None);
        }

        let query = self.generator.encode_text(prompt).await?;
        let top = similarity::find_top_k(&query, &references, 1, -1.0)?;

        let best = top.into_iter().next().map(|result| AestheticMatch {
            label: result.id,
            similarity: result.score,
        });

        if let Some(ref found) = best {
            info!(
                "nearest aesthetic for '{prompt}': {} (sim: {:.4})",
                found.label, found.similarity
            );
        }

        Ok(best)
    }
}
