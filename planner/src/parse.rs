//! Natural-language prompt parsing.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use styledeck_cache::{CacheStore, SingleFlight, key};
use styledeck_retry::RetryPolicy;

use crate::client::{CompletionBackend, CompletionRequest};
use crate::error::{PlannerError, Result};
use crate::fallback;
use crate::query::ParsedQuery;

const DEFAULT_TTL: Duration = Duration::from_secs(3600);
const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;

const PARSE_INSTRUCTION: &str = "You turn fashion shopping prompts into JSON with the fields \
aesthetic (string), budget (non-negative integer or null), size (XS|S|M|L|XL|XXL or null), \
gender (male|female|unisex or null), occasion (string or null) and categories (array drawn \
from top, bottom, shoes, accessories). Respond with JSON only.";

/// Parses natural-language prompts into [`ParsedQuery`] values.
///
/// State machine: check cache, call the completion API under the
/// completion retry policy, decode and validate, cache with a bounded
/// TTL. Any failure after the cache check degrades to the rule-based
/// extractor, whose low-confidence result is returned uncached.
pub struct PromptParser {
    client: Arc<dyn CompletionBackend>,
    cache: Arc<CacheStore>,
    flights: SingleFlight,
    policy: RetryPolicy,
    ttl: Duration,
}

impl PromptParser {
    /// Create a parser over a completion backend and cache store.
    pub fn new(client: Arc<dyn CompletionBackend>, cache: Arc<CacheStore>) -> Self {
        Self {
            client,
            cache,
            flights: SingleFlight::new(),
            policy: RetryPolicy::completion_api(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Set the cache TTL for API-derived results.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the retry policy for completion calls.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Parse a prompt. The boolean reports whether the result came
    /// from cache.
    pub async fn parse(&self, prompt: &str) -> (ParsedQuery, bool) {
        let cache_key = key::prompt_key(prompt);

        if let Some(hit) = self.lookup(&cache_key).await {
            return (hit, true);
        }

        // One upstream computation per key; followers re-check the
        // cache once the leader lands.
        let _permit = self.flights.acquire(&cache_key).await;
        if let Some(hit) = self.lookup(&cache_key).await {
            return (hit, true);
        }

        match self.parse_remote(prompt).await {
            Ok(parsed) => {
                if let Ok(serialized) = serde_json::to_string(&parsed) {
                    self.cache
                        .set_with_ttl(&cache_key, &serialized, self.ttl)
                        .await;
                }
                info!("parsed prompt into aesthetic: {}", parsed.aesthetic);
                (parsed, false)
            }
            Err(err) => {
                warn!("prompt parsing failed, falling back: {err}");
                (fallback::extract_query(prompt), false)
            }
        }
    }

    async fn lookup(&self, cache_key: &str) -> Option<ParsedQuery> {
        let cached = self.cache.get(cache_key).await?;
        match serde_json::from_str(&cached) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!("discarding corrupt cache entry {cache_key}: {err}");
                None
            }
        }
    }

    async fn parse_remote(&self, prompt: &str) -> Result<ParsedQuery> {
        let content = styledeck_retry::execute(
            || {
                self.client.complete(CompletionRequest {
                    system: PARSE_INSTRUCTION.to_string(),
                    user: prompt.to_string(),
                    max_tokens: MAX_TOKENS,
                    temperature: TEMPERATURE,
                })
            },
            &self.policy,
        )
        .await?;

        let parsed: ParsedQuery = serde_json::from_str(&content)
            .map_err(|e| PlannerError::MalformedResponse(e.to_string()))?;

        parsed.validate()
    }
}
