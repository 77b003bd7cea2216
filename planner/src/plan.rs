//! Outfit planning from a parsed query.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use styledeck_cache::{CacheStore, SingleFlight, key};
use styledeck_retry::RetryPolicy;

use crate::client::{CompletionBackend, CompletionRequest};
use crate::error::{PlannerError, Result};
use crate::fallback;
use crate::query::ParsedQuery;

const MAX_TOKENS: u32 = 500;
// Planning wants variety; parsing wants fidelity.
const TEMPERATURE: f32 = 0.8;

const MIN_ITEMS: usize = 2;
const MAX_ITEMS: usize = 4;

const PLAN_INSTRUCTION: &str = "You are a fashion stylist. Given a structured query with an \
aesthetic, gender, occasion and required categories, respond with JSON holding items (an \
array of 2 to 4 concrete item descriptions) and reasoning (one sentence). Respond with JSON \
only.";

/// A planned outfit: 2-4 item descriptions plus free-text reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutfitPlan {
    /// Concrete item descriptions.
    pub items: Vec<String>,

    /// Why these items fit the query.
    #[serde(default)]
    pub reasoning: String,
}

impl OutfitPlan {
    /// Enforce the item-count invariant on an API-derived plan.
    fn validate(self) -> Result<Self> {
        if !(MIN_ITEMS..=MAX_ITEMS).contains(&self.items.len()) {
            return Err(PlannerError::MalformedResponse(format!(
                "plan has {} items, expected {MIN_ITEMS}-{MAX_ITEMS}",
                self.items.len()
            )));
        }
        Ok(self)
    }
}

/// Plans outfits for parsed queries.
///
/// Same state machine as prompt parsing, with two differences: the
/// item-count invariant is enforced post-parse, and successful plans
/// cache permanently because the aesthetic-to-plan space is small and
/// near-stationary, unlike arbitrary user prompts.
pub struct OutfitPlanner {
    client: Arc<dyn CompletionBackend>,
    cache: Arc<CacheStore>,
    flights: SingleFlight,
    policy: RetryPolicy,
}

impl OutfitPlanner {
    /// Create a planner over a completion backend and cache store.
    pub fn new(client: Arc<dyn CompletionBackend>, cache: Arc<CacheStore>) -> Self {
        Self {
            client,
            cache,
            flights: SingleFlight::new(),
            policy: RetryPolicy::completion_api(),
        }
    }

    /// Set the retry policy for completion calls.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Plan an outfit. The boolean reports whether the result came
    /// from cache.
    pub async fn plan(&self, query: &ParsedQuery) -> (OutfitPlan, bool) {
        let cache_key = key::plan_key(
            &query.aesthetic,
            query.gender.map(|g| g.as_str()),
            &query.category_names(),
            query.occasion.as_deref(),
        );

        if let Some(hit) = self.lookup(&cache_key).await {
            return (hit, true);
        }

        let _permit = self.flights.acquire(&cache_key).await;
        if let Some(hit) = self.lookup(&cache_key).await {
            return (hit, true);
        }

        match self.plan_remote(query).await {
            Ok(plan) => {
                if let Ok(serialized) = serde_json::to_string(&plan) {
                    self.cache.set_permanent(&cache_key, &serialized).await;
                }
                info!(
                    "planned outfit with {} items for aesthetic: {}",
                    plan.items.len(),
                    query.aesthetic
                );
                (plan, false)
            }
            Err(err) => {
                warn!("outfit planning failed, falling back: {err}");
                (fallback::plan_for(query), false)
            }
        }
    }

    async fn lookup(&self, cache_key: &str) -> Option<OutfitPlan> {
        let cached = self.cache.get(cache_key).await?;
        match serde_json::from_str(&cached) {
            Ok(plan) => Some(plan),
            Err(err) => {
                warn!("discarding corrupt cache entry {cache_key}: {err}");
                None
            }
        }
    }

    async fn plan_remote(&self, query: &ParsedQuery) -> Result<OutfitPlan> {
        let user = serde_json::to_string_pretty(&serde_json::json!({
            "aesthetic": query.aesthetic,
            "gender": query.gender,
            "occasion": query.occasion,
            "categories": query.categories,
        }))
        .map_err(|e| PlannerError::InvalidQuery(e.to_string()))?;

        let content = styledeck_retry::execute(
            || {
                self.client.complete(CompletionRequest {
                    system: PLAN_INSTRUCTION.to_string(),
                    user: user.clone(),
                    max_tokens: MAX_TOKENS,
                    temperature: TEMPERATURE,
                })
            },
            &self.policy,
        )
        .await?;

        let plan: OutfitPlan = serde_json::from_str(&content)
            .map_err(|e| PlannerError::MalformedResponse(e.to_string()))?;

        plan.validate()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use crate::query::{Category, Gender};

    use super::*;

    struct CannedBackend(std::result::Result<String, String>);

    #[async_trait]
    impl CompletionBackend for CannedBackend {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            match &self.0 {
                Ok(body) => Ok(body.clone()),
                Err(err) => Err(PlannerError::Upstream(err.clone())),
            }
        }
    }

    fn planner(backend: CannedBackend) -> OutfitPlanner {
        OutfitPlanner::new(Arc::new(backend), Arc::new(CacheStore::disabled()))
            .with_policy(RetryPolicy::completion_api().with_max_retries(0))
    }

    fn query(aesthetic: &str) -> ParsedQuery {
        ParsedQuery {
            aesthetic: aesthetic.to_string(),
            budget: None,
            size: None,
            gender: Some(Gender::Unisex),
            occasion: None,
            categories: vec![Category::Top, Category::Bottom],
        }
    }

    #[tokio::test]
    async fn valid_plan_is_returned() {
        let planner = planner(CannedBackend(Ok(
            r#"{"items": ["linen shirt", "pleated trousers", "loafers"], "reasoning": "clean"}"#
                .to_string(),
        )));

        let (plan, cached) = planner.plan(&query("old money")).await;

        assert_eq!(plan.items.len(), 3);
        assert_eq!(plan.reasoning, "clean");
        assert!(!cached);
    }

    #[tokio::test]
    async fn too_many_items_routes_to_fallback() {
        let planner = planner(CannedBackend(Ok(
            r#"{"items": ["a", "b", "c", "d", "e"], "reasoning": "overstuffed"}"#.to_string(),
        )));

        let (plan, cached) = planner.plan(&query("streetwear")).await;

        // Fallback table answers instead of the five-item plan.
        assert!((2..=4).contains(&plan.items.len()));
        assert_eq!(plan.items[0], "graphic hoodie");
        assert!(!cached);
    }

    #[tokio::test]
    async fn single_item_routes_to_fallback() {
        let planner = planner(CannedBackend(Ok(
            r#"{"items": ["just one thing"]}"#.to_string(),
        )));

        let (plan, _) = planner.plan(&query("y2k")).await;
        assert!((2..=4).contains(&plan.items.len()));
    }

    #[tokio::test]
    async fn upstream_failure_routes_to_fallback() {
        let planner = planner(CannedBackend(Err("timeout".to_string())));

        let (plan, cached) = planner.plan(&query("korean minimal")).await;

        assert_eq!(
            plan.items,
            vec!["oversized t-shirt", "straight pants", "white sneakers"]
        );
        assert!(!cached);
    }
}
