//! Completion API client.
//!
//! The upstream is an OpenAI-compatible chat-completions endpoint in
//! forced-JSON output mode. Its output is untrusted: this module only
//! extracts the text blob; decoding and schema validation happen at
//! the call sites, where each failure has its own fallback.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{PlannerError, Result};

/// One completion call: system instruction plus user content.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System instruction text. Opaque to the core.
    pub system: String,

    /// User content.
    pub user: String,

    /// Maximum output tokens.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,
}

/// Trait for completion backends.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion and return the raw text blob.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Client for an OpenAI-compatible chat-completions API.
pub struct OpenAiCompletionClient {
    /// API key.
    api_key: String,

    /// API base URL.
    base_url: String,

    /// Model identifier.
    model: String,

    /// HTTP client.
    client: reqwest::Client,
}

impl OpenAiCompletionClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        debug!("calling completion API with model: {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlannerError::Upstream(format!(
                "completion API returned {status}: {error_text}"
            )));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| PlannerError::MalformedResponse(e.to_string()))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                PlannerError::MalformedResponse("no choices in response".to_string())
            })?;

        Ok(content)
    }
}

/// Chat-completions API response format.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
