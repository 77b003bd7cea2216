//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Pairwise-similarity threshold below which coherence is penalized.
/// Cohesive fashion items empirically cluster above ~0.7 in this
/// embedding space, so sub-0.6 means a likely mismatch.
pub const COHERENCE_THRESHOLD: f32 = 0.6;

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical vectors
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut Embedding) {
    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// Aggregate coherence of a set of embeddings, in [0, 1].
///
/// Zero or one embedding is trivially coherent (1.0). Otherwise the
/// score is the mean of all pairwise cosine similarities, with a
/// quadratic down-weighting `mean * (mean / 0.6)` applied when the
/// mean falls below [`COHERENCE_THRESHOLD`], clamped to [0, 1].
/// Inputs are re-normalized defensively even though they should
/// already be unit vectors.
pub fn coherence(embeddings: &[Embedding]) -> Result<f32> {
    if embeddings.len() < 2 {
        return Ok(1.0);
    }

    let mut unit = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let mut v = embedding.clone();
        normalize(&mut v);
        unit.push(v);
    }

    let mut total = 0.0f32;
    let mut pairs = 0u32;
    for i in 0..unit.len() {
        for j in (i + 1)..unit.len() {
            total += dot_product(&unit[i], &unit[j])?;
            pairs += 1;
        }
    }

    let mut mean = total / pairs as f32;
    if mean < COHERENCE_THRESHOLD {
        mean *= mean / COHERENCE_THRESHOLD;
    }

    Ok(mean.clamp(0.0, 1.0))
}

/// A similarity search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// ID of the matched item.
    pub id: String,

    /// Similarity score.
    pub score: f32,
}

impl SimilarityResult {
    /// Create a new similarity result.
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Find the top-k most similar embeddings among in-memory candidates.
pub fn find_top_k(
    query: &Embedding,
    candidates: &[(String, Embedding)],
    k: usize,
    min_score: f32,
) -> Result<Vec<SimilarityResult>> {
    let mut scores: Vec<(OrderedFloat<f32>, String)> = Vec::with_capacity(candidates.len());

    for (id, embedding) in candidates {
        let score = cosine_similarity(query, embedding)?;
        if score >= min_score {
            scores.push((OrderedFloat(score), id.clone()));
        }
    }

    // Sort by score descending
    scores.sort_by(|a, b| b.0.cmp(&a.0));

    let results: Vec<SimilarityResult> = scores
        .into_iter()
        .take(k)
        .map(|(score, id)| SimilarityResult::new(id, score.0))
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).is_err());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn coherence_of_empty_and_single_is_one() {
        assert_eq!(coherence(&[]).unwrap(), 1.0);
        assert_eq!(coherence(&[vec![0.0, 1.0, 0.0]]).unwrap(), 1.0);
    }

    #[test]
    fn coherence_of_identical_vectors_is_one() {
        let v = vec![0.6, 0.8, 0.0];
        let score = coherence(&[v.clone(), v]).unwrap();
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn coherence_of_orthogonal_vectors_is_penalized() {
        let score = coherence(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]).unwrap();
        assert!(score < 0.5);
        assert!(score >= 0.0);
    }

    #[test]
    fn coherence_renormalizes_inputs() {
        // Same direction, wildly different magnitudes.
        let score = coherence(&[vec![10.0, 0.0], vec![0.1, 0.0]]).unwrap();
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn coherence_above_threshold_is_linear() {
        // Two unit vectors at cos ~0.8: no penalty applies.
        let a = vec![1.0, 0.0];
        let b = vec![0.8, 0.6];
        let score = coherence(&[a, b]).unwrap();
        assert!((score - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_find_top_k() {
        let query = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            ("a".to_string(), vec![1.0, 0.0, 0.0]), // similarity 1.0
            ("b".to_string(), vec![0.0, 1.0, 0.0]), // similarity 0.0
            ("c".to_string(), vec![0.7, 0.7, 0.0]), // similarity ~0.7
        ];

        let results = find_top_k(&query, &candidates, 2, 0.0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "c");
    }
}
