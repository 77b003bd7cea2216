//! Outfit coherence scoring via the completion API.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use styledeck_retry::RetryPolicy;

use crate::client::{CompletionBackend, CompletionRequest};
use crate::error::{PlannerError, Result};

const MAX_TOKENS: u32 = 500;
// Low temperature keeps repeated scorings consistent.
const TEMPERATURE: f32 = 0.3;

/// Upper bound on outfits per scoring batch.
pub const MAX_OUTFITS_PER_BATCH: usize = 10;

const NEUTRAL_SCORE: f32 = 5.0;
const MIN_SCORE: f32 = 1.0;
const MAX_SCORE: f32 = 10.0;

const SCORE_INSTRUCTION: &str = "You are a professional fashion stylist scoring outfit \
coherence. Given an aesthetic and a numbered list of outfits, respond with JSON holding \
scores: an array with one number between 1 and 10 per outfit, in order. Respond with JSON \
only.";

/// Product item in an outfit candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutfitItem {
    pub title: String,
    pub category: String,
    pub price: f64,
}

/// A complete outfit candidate to be scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutfitCandidate {
    pub items: Vec<OutfitItem>,
}

/// Scores batches of outfit candidates against an aesthetic.
///
/// Scores are request-specific and never cached. Upstream failure
/// degrades to the neutral score for every candidate, so callers
/// always receive exactly one score per outfit.
pub struct OutfitScorer {
    client: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    scores: Vec<f32>,
}

impl OutfitScorer {
    /// Create a scorer over a completion backend.
    pub fn new(client: Arc<dyn CompletionBackend>) -> Self {
        Self {
            client,
            policy: RetryPolicy::completion_api(),
        }
    }

    /// Set the retry policy for completion calls.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Score each outfit in `outfits` against `aesthetic`, returning
    /// exactly one score in [1, 10] per candidate.
    pub async fn score(&self, aesthetic: &str, outfits: &[OutfitCandidate]) -> Result<Vec<f32>> {
        if outfits.len() > MAX_OUTFITS_PER_BATCH {
            return Err(PlannerError::InvalidQuery(format!(
                "at most {MAX_OUTFITS_PER_BATCH} outfits per batch, got {}",
                outfits.len()
            )));
        }
        if outfits.is_empty() {
            return Ok(Vec::new());
        }

        match self.score_remote(aesthetic, outfits).await {
            Ok(scores) => {
                info!("scored {} outfits for aesthetic: {aesthetic}", scores.len());
                Ok(scores)
            }
            Err(err) => {
                warn!("outfit scoring failed, returning neutral scores: {err}");
                Ok(vec![NEUTRAL_SCORE; outfits.len()])
            }
        }
    }

    async fn score_remote(
        &self,
        aesthetic: &str,
        outfits: &[OutfitCandidate],
    ) -> Result<Vec<f32>> {
        let outfits_json: Vec<serde_json::Value> = outfits
            .iter()
            .enumerate()
            .map(|(i, outfit)| {
                let items: Vec<String> = outfit
                    .items
                    .iter()
                    .map(|item| format!("{}: {} (₹{})", item.category, item.title, item.price))
                    .collect();
                serde_json::json!({"id": i + 1, "items": items})
            })
            .collect();

        let user = serde_json::to_string_pretty(&serde_json::json!({
            "aesthetic": aesthetic,
            "outfits": outfits_json,
        }))
        .map_err(|e| PlannerError::InvalidQuery(e.to_string()))?;

        let content = styledeck_retry::execute(
            || {
                self.client.complete(CompletionRequest {
                    system: SCORE_INSTRUCTION.to_string(),
                    user: user.clone(),
                    max_tokens: MAX_TOKENS,
                    temperature: TEMPERATURE,
                })
            },
            &self.policy,
        )
        .await?;

        let response: ScoreResponse = serde_json::from_str(&content)
            .map_err(|e| PlannerError::MalformedResponse(e.to_string()))?;

        if response.scores.len() != outfits.len() {
            return Err(PlannerError::MalformedResponse(format!(
                "expected {} scores, got {}",
                outfits.len(),
                response.scores.len()
            )));
        }

        Ok(response
            .scores
            .into_iter()
            .map(|s| s.clamp(MIN_SCORE, MAX_SCORE))
            .collect())
    }
}
