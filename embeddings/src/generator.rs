//! Embedding generation over an encoder backend.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::encoder::EncoderBackend;
use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_BATCH_FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Outcome of one image slot in a batch.
///
/// Slots are index-aligned with the request list; a failed fetch or
/// encode occupies its slot instead of silently shifting the rest.
#[derive(Debug, Clone)]
pub enum ImageSlot {
    /// The image was fetched and encoded.
    Encoded(Embedding),

    /// The image could not be processed; the reason is logged and
    /// carried here.
    Failed(String),
}

impl ImageSlot {
    /// The embedding, when this slot succeeded.
    pub fn embedding(&self) -> Option<&Embedding> {
        match self {
            ImageSlot::Encoded(embedding) => Some(embedding),
            ImageSlot::Failed(_) => None,
        }
    }
}

/// Result of a batch encode.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    /// Text embeddings, aligned with the input texts.
    pub texts: Vec<Embedding>,

    /// Per-slot image outcomes, aligned with the input URLs.
    pub images: Vec<ImageSlot>,
}

/// Generates unit-normalized fixed-length vectors for text and images.
///
/// The backend is probed lazily on first use so a missing model never
/// blocks readiness checks; the probe failure surfaces as
/// [`EmbeddingError::ModelUnavailable`] on the call itself and is
/// re-attempted on the next one.
pub struct EmbeddingGenerator {
    backend: Arc<dyn EncoderBackend>,
    fetch_client: reqwest::Client,
    ready: OnceCell<()>,
    fetch_timeout: Duration,
    batch_fetch_timeout: Duration,
    max_concurrent_fetches: usize,
}

impl EmbeddingGenerator {
    /// Create a generator over the given backend.
    pub fn new(backend: Arc<dyn EncoderBackend>) -> Self {
        Self {
            backend,
            fetch_client: reqwest::Client::new(),
            ready: OnceCell::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            batch_fetch_timeout: DEFAULT_BATCH_FETCH_TIMEOUT,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }

    /// Set the timeout for a single image fetch.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the per-image timeout used during batch fetches.
    pub fn with_batch_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_fetch_timeout = timeout;
        self
    }

    /// Bound the number of concurrent image downloads in a batch.
    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit.max(1);
        self
    }

    /// Output dimension of the underlying backend.
    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    async fn ensure_ready(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                self.backend.ready().await?;
                info!("encoder backend {} initialized", self.backend.name());
                Ok(())
            })
            .await
            .map(|_| ())
    }

    /// Encode text into a unit-normalized vector.
    pub async fn encode_text(&self, text: &str) -> Result<Embedding> {
        self.ensure_ready().await?;

        let mut vectors = self.backend.encode_texts(&[text.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| EmbeddingError::MalformedResponse("no vector returned".to_string()))?;

        self.finish(vector)
    }

    /// Download an image and encode it into a unit-normalized vector.
    pub async fn encode_image(&self, image_url: &str) -> Result<Embedding> {
        self.ensure_ready().await?;

        let bytes = self.fetch_image(image_url, self.fetch_timeout).await?;
        let mut vectors = self.backend.encode_images(&[bytes]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| EmbeddingError::MalformedResponse("no vector returned".to_string()))?;

        self.finish(vector)
    }

    /// Encode texts and images in one batch.
    ///
    /// Image downloads run concurrently, bounded by the configured
    /// limit. A fetch failure fills that slot with
    /// [`ImageSlot::Failed`] and never aborts the batch; text and
    /// image outputs both stay index-aligned with their inputs.
    pub async fn encode_batch(
        &self,
        texts: &[String],
        image_urls: &[String],
    ) -> Result<BatchOutput> {
        self.ensure_ready().await?;

        let mut output = BatchOutput::default();

        if !texts.is_empty() {
            let vectors = self.backend.encode_texts(texts).await?;
            output.texts = vectors
                .into_iter()
                .map(|v| self.finish(v))
                .collect::<Result<Vec<_>>>()?;
        }

        if !image_urls.is_empty() {
            output.images = self.encode_image_slots(image_urls).await?;
        }

        Ok(output)
    }

    async fn encode_image_slots(&self, image_urls: &[String]) -> Result<Vec<ImageSlot>> {
        let fetches = futures::stream::iter(image_urls.iter().cloned().enumerate().map(
            |(i, url)| async move {
                let result = self.fetch_image(&url, self.batch_fetch_timeout).await;
                (i, result)
            },
        ))
        .buffer_unordered(self.max_concurrent_fetches)
        .collect::<Vec<_>>()
        .await;

        let mut slots: Vec<ImageSlot> = image_urls
            .iter()
            .map(|_| ImageSlot::Failed("not fetched".to_string()))
            .collect();

        let mut fetched_indices = Vec::new();
        let mut fetched_bytes = Vec::new();
        for (i, result) in fetches {
            match result {
                Ok(bytes) => {
                    fetched_indices.push(i);
                    fetched_bytes.push(bytes);
                }
                Err(err) => {
                    warn!("skipping image {}: {err}", image_urls[i]);
                    slots[i] = ImageSlot::Failed(err.to_string());
                }
            }
        }

        if fetched_bytes.is_empty() {
            return Ok(slots);
        }

        let vectors = self.backend.encode_images(&fetched_bytes).await?;
        for (slot_index, vector) in fetched_indices.into_iter().zip(vectors) {
            slots[slot_index] = match self.finish(vector) {
                Ok(embedding) => ImageSlot::Encoded(embedding),
                Err(err) => {
                    warn!("dropping image vector {}: {err}", image_urls[slot_index]);
                    ImageSlot::Failed(err.to_string())
                }
            };
        }

        Ok(slots)
    }

    async fn fetch_image(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        debug!("fetching image: {url}");

        let response = self
            .fetch_client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| EmbeddingError::ImageFetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(EmbeddingError::ImageFetch {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EmbeddingError::ImageFetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(bytes.to_vec())
    }

    /// Dimension-check and normalize a raw backend vector. Callers of
    /// this crate never see an un-normalized embedding.
    fn finish(&self, mut vector: Embedding) -> Result<Embedding> {
        let expected = self.backend.dimension();
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude == 0.0 {
            return Err(EmbeddingError::MalformedResponse(
                "zero vector from encoder".to_string(),
            ));
        }

        normalize(&mut vector);
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// Backend double returning fixed raw (un-normalized) vectors.
    struct FixedBackend {
        dimension: usize,
        ready_ok: bool,
    }

    #[async_trait]
    impl EncoderBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn ready(&self) -> Result<()> {
            if self.ready_ok {
                Ok(())
            } else {
                Err(EmbeddingError::ModelUnavailable("no weights".to_string()))
            }
        }

        async fn encode_texts(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| {
                    let mut v = vec![0.0; self.dimension];
                    v[0] = 3.0 + i as f32;
                    v[1] = 4.0;
                    v
                })
                .collect())
        }

        async fn encode_images(&self, images: &[Vec<u8>]) -> Result<Vec<Embedding>> {
            Ok(images
                .iter()
                .map(|_| {
                    let mut v = vec![0.0; self.dimension];
                    v[0] = 5.0;
                    v
                })
                .collect())
        }
    }

    fn generator(dimension: usize) -> EmbeddingGenerator {
        EmbeddingGenerator::new(Arc::new(FixedBackend {
            dimension,
            ready_ok: true,
        }))
    }

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn encode_text_returns_unit_vector() {
        let generator = generator(4);
        let embedding = generator.encode_text("oversized tee").await.unwrap();

        assert_eq!(embedding.len(), 4);
        assert!((norm(&embedding) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn model_failure_surfaces_on_first_call() {
        let generator = EmbeddingGenerator::new(Arc::new(FixedBackend {
            dimension: 4,
            ready_ok: false,
        }));

        let result = generator.encode_text("anything").await;
        assert!(matches!(result, Err(EmbeddingError::ModelUnavailable(_))));
    }

    #[tokio::test]
    async fn batch_isolates_failed_image_slots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let generator = generator(4);
        let output = generator
            .encode_batch(
                &["shirt".to_string()],
                &[
                    format!("{}/ok.jpg", server.uri()),
                    format!("{}/missing.jpg", server.uri()),
                    format!("{}/ok.jpg", server.uri()),
                ],
            )
            .await
            .unwrap();

        assert_eq!(output.texts.len(), 1);
        assert_eq!(output.images.len(), 3);
        assert!(output.images[0].embedding().is_some());
        assert!(output.images[1].embedding().is_none());
        assert!(output.images[2].embedding().is_some());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        // Backend claims 4 but the generator expects what the backend
        // declares; force a mismatch by lying about the dimension.
        struct Lying;

        #[async_trait]
        impl EncoderBackend for Lying {
            fn name(&self) -> &str {
                "lying"
            }
            fn dimension(&self) -> usize {
                8
            }
            async fn ready(&self) -> Result<()> {
                Ok(())
            }
            async fn encode_texts(&self, texts: &[String]) -> Result<Vec<Embedding>> {
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
            async fn encode_images(&self, _images: &[Vec<u8>]) -> Result<Vec<Embedding>> {
                Ok(Vec::new())
            }
        }

        let generator = EmbeddingGenerator::new(Arc::new(Lying));
        let result = generator.encode_text("x").await;

        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 8,
                actual: 2
            })
        ));
    }
}
