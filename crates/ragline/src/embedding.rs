//! Remote embedding client with retry and backoff.
//!
//! Implements the core [`Embedder`] trait over any OpenAI-compatible
//! `POST /embeddings` endpoint. Two providers are configurable:
//!
//! - **`openai`** — `https://api.openai.com/v1/embeddings`, key from
//!   `OPENAI_API_KEY`.
//! - **`forge`** — a self-hosted compatible endpoint at a configured
//!   base URL, key from `FORGE_API_KEY`.
//!
//! # Retry Strategy
//!
//! Every failure is treated as transient at this layer — transport
//! errors and non-2xx statuses alike — because the caller has already
//! committed to the attempt and a duplicate embedding request is
//! harmless. After the initial call, up to `max_retries` extra attempts
//! are made with exponential backoff (base delay, doubling each time).
//! When the budget is exhausted the last error is surfaced.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::config::EmbeddingConfig;
use ragline_core::embedder::Embedder;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding endpoint returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("embedding request failed: {0}")]
    Transport(String),
    #[error("embedding failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
    #[error("malformed embedding response: {0}")]
    Malformed(String),
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// HTTP client for an OpenAI-compatible embeddings endpoint.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl RemoteEmbedder {
    /// Build an embedder from configuration, resolving the endpoint and
    /// API key for the configured provider.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let (endpoint, key_var) = match config.provider.as_str() {
            "openai" => (
                "https://api.openai.com/v1/embeddings".to_string(),
                "OPENAI_API_KEY",
            ),
            "forge" => {
                let base = config
                    .base_url
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("embedding.base_url required for forge"))?;
                (format!("{}/embeddings", base.trim_end_matches('/')), "FORGE_API_KEY")
            }
            other => anyhow::bail!("Unknown embedding provider: {}", other),
        };

        let api_key = std::env::var(key_var)
            .map_err(|_| anyhow::anyhow!("{key_var} environment variable not set"))?;

        Ok(Self::new(
            endpoint,
            api_key,
            config.model.clone(),
            config.dims,
            config.batch_size,
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        endpoint: String,
        api_key: String,
        model: String,
        dims: usize,
        batch_size: usize,
        max_retries: u32,
        retry_base_delay: Duration,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            api_key,
            model,
            dims,
            batch_size,
            max_retries,
            retry_base_delay,
        }
    }

    /// One HTTP round trip, no retry.
    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Malformed(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbedError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        // The API may return items out of order; `index` is authoritative.
        let mut items = parsed.data;
        items.sort_by_key(|item| item.index);

        let mut vectors = Vec::with_capacity(items.len());
        for item in items {
            if item.embedding.len() != self.dims {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.dims,
                    got: item.embedding.len(),
                });
            }
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }

    /// One batch with the full retry budget.
    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut last_err: Option<EmbedError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: base, 2×base, 4×base, ...
                let delay = self.retry_base_delay * 2u32.pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }

            match self.request(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "embedding attempt failed");
                    last_err = Some(e);
                }
            }
        }

        let last = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        Err(EmbedError::Exhausted {
            attempts: self.max_retries + 1,
            last,
        })
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_vectors = self.embed_with_retry(batch).await?;
            vectors.extend(batch_vectors);
        }
        Ok(vectors)
    }
}
