//! Embedding provider abstraction and the OpenAI implementation.
//!
//! Defines the [`EmbeddingProvider`] trait used for both index building and
//! query embedding (the same provider must serve both, or similarity scores
//! are meaningless), plus vector utilities:
//!
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for BLOB storage
//! - [`blob_to_vec`] — decode a BLOB back into a `Vec<f32>`
//!
//! # Retry strategy
//!
//! The OpenAI backend retries transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// A provider that maps text to dense vectors.
///
/// Used at index-build time for chunk texts and at query time for the user's
/// question. [`embed_batch`](EmbeddingProvider::embed_batch) exists purely
/// for throughput and must return vectors in input order; the default
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dimensions(&self) -> usize;

    /// Generate an embedding vector for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

fn provider_error(message: impl Into<String>) -> RagError {
    RagError::Provider { provider: "openai-embeddings".to_string(), message: message.into() }
}

/// Embedding provider backed by the OpenAI embeddings API.
///
/// Calls `POST /v1/embeddings` with the configured model, batching inputs
/// and retrying rate limits and server errors with exponential backoff.
#[derive(Debug)]
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

impl OpenAiEmbeddings {
    /// Create a provider from configuration and an API key.
    pub fn new(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Configuration(
                "embedding API key must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| provider_error(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }

    async fn call_api(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest { model: &self.model, input: texts };
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(OPENAI_EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: EmbeddingResponse = response
                            .json()
                            .await
                            .map_err(|e| provider_error(format!("invalid response: {e}")))?;
                        let vectors: Vec<Vec<f32>> =
                            parsed.data.into_iter().map(|d| d.embedding).collect();
                        self.check_dimensions(&vectors)?;
                        return Ok(vectors);
                    }

                    let detail = api_error_detail(response).await;

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(provider_error(format!("API error {status}: {detail}")));
                        continue;
                    }

                    // Other client errors: don't retry
                    return Err(provider_error(format!("API error {status}: {detail}")));
                }
                Err(e) => {
                    last_err = Some(provider_error(format!("request failed: {e}")));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| provider_error("embedding failed after retries")))
    }

    /// The configured `dims` must match what the API actually returns, or
    /// every stored vector would disagree with the configuration.
    fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<()> {
        match vectors.first() {
            Some(first) if first.len() != self.dims => Err(RagError::Configuration(format!(
                "embedding model '{}' returned {}-dimensional vectors but embedding.dims is {}",
                self.model,
                first.len(),
                self.dims
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.call_api(std::slice::from_ref(&text.to_string())).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| provider_error("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.call_api(texts).await?;
        if vectors.len() != texts.len() {
            return Err(provider_error(format!(
                "API returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}

// ============ OpenAI API request/response types ============

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull a human-readable message out of an error response body.
pub(crate) async fn api_error_detail(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

// ============ Vector utilities ============

/// Encode a float vector as little-endian `f32` bytes.
///
/// The round-trip through [`blob_to_vec`] is bit-exact, which the persisted
/// index relies on to reproduce identical search results after a reload.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB of little-endian `f32` bytes back into a vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip_is_bit_exact() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001, f32::MIN_POSITIVE];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), vec.len() * 4);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec.len(), restored.len());
        for (a, b) in vec.iter().zip(restored.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn empty_api_key_rejected() {
        let config = EmbeddingConfig::default();
        let err = OpenAiEmbeddings::new(&config, "").unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn mismatched_response_dimensions_rejected() {
        let mut config = EmbeddingConfig::default();
        config.dims = 4;
        let provider = OpenAiEmbeddings::new(&config, "test-key").unwrap();

        assert!(provider.check_dimensions(&[vec![0.0; 4]]).is_ok());
        assert!(provider.check_dimensions(&[]).is_ok());

        let err = provider.check_dimensions(&[vec![0.0; 3]]).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }
}
