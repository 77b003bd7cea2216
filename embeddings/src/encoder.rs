//! Encoder backends.
//!
//! The production backend is an HTTP CLIP inference server. Vectors
//! come back raw (not normalized); normalization is the generator's
//! responsibility.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Trait for encoder backends.
#[async_trait]
pub trait EncoderBackend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Get the output dimension of this backend.
    fn dimension(&self) -> usize;

    /// Probe the backend. Called lazily on first use; a failure here
    /// surfaces as [`EmbeddingError::ModelUnavailable`].
    async fn ready(&self) -> Result<()>;

    /// Encode a batch of texts into raw vectors, one per input.
    async fn encode_texts(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Encode a batch of decoded images into raw vectors, one per
    /// input.
    async fn encode_images(&self, images: &[Vec<u8>]) -> Result<Vec<Embedding>>;
}

/// HTTP client for a CLIP inference server.
pub struct ClipHttpEncoder {
    /// Server base URL.
    base_url: String,

    /// Model identifier sent with each request.
    model: String,

    /// Expected output dimension.
    dimension: usize,

    /// HTTP client.
    client: reqwest::Client,
}

impl ClipHttpEncoder {
    /// Create a new encoder client for the given server.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: "ViT-B-32".to_string(),
            dimension: crate::EMBEDDING_DIM,
            client: reqwest::Client::new(),
        }
    }

    /// Set the model identifier.
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

    async fn post_encode(&self, path: &str, body: serde_json::Value) -> Result<Vec<Embedding>> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Upstream(format!(
                "encoder returned {status}: {error_text}"
            )));
        }

        let result: EncodeResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        Ok(result.embeddings)
    }
}

#[async_trait]
impl EncoderBackend for ClipHttpEncoder {
    fn name(&self) -> &str {
        "clip-http"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ready(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::ModelUnavailable(format!(
                "encoder health check returned {}",
                response.status()
            )));
        }

        debug!("encoder backend ready: {}", self.model);
        Ok(())
    }

    async fn encode_texts(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("encoding {} texts with model {}", texts.len(), self.model);

        let body = serde_json::json!({
            "model": self.model,
            "texts": texts,
        });

        let embeddings = self.post_encode("/encode/text", body).await?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::MalformedResponse(format!(
                "expected {} text vectors, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    async fn encode_images(&self, images: &[Vec<u8>]) -> Result<Vec<Embedding>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        debug!("encoding {} images with model {}", images.len(), self.model);

        let encoded: Vec<String> = images.iter().map(|bytes| BASE64.encode(bytes)).collect();

        let body = serde_json::json!({
            "model": self.model,
            "images": encoded,
        });

        let embeddings = self.post_encode("/encode/image", body).await?;

        if embeddings.len() != images.len() {
            return Err(EmbeddingError::MalformedResponse(format!(
                "expected {} image vectors, got {}",
                images.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}

/// Inference server response format.
#[derive(Debug, Deserialize)]
struct EncodeResponse {
    embeddings: Vec<Embedding>,
}
