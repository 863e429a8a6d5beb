//! Batching, retry and timeout handling around an embedding provider

use futures::stream::{self, StreamExt, TryStreamExt};
use std::ops::Range;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

/// Embedder that owns batching and retry policy for a provider
///
/// Callers are expected to filter out already-indexed chunks first;
/// the embedder embeds whatever it is given.
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
}

impl Embedder {
    /// Create an embedder, validating the batching configuration
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { provider, config })
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Provider name for logging
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.provider.health_check().await
    }

    /// Split `total` inputs into consecutive ranges of at most `batch_size`
    pub fn plan_batches(&self, total: usize) -> Vec<Range<usize>> {
        (0..total)
            .step_by(self.config.batch_size)
            .map(|start| start..(start + self.config.batch_size).min(total))
            .collect()
    }

    /// Embed one batch, retrying transient failures with backoff
    ///
    /// Each attempt is bounded by the request timeout; a timed-out
    /// attempt counts against the retry budget like any transient
    /// failure. Exhausting the budget or hitting a permanent error
    /// yields [`Error::BatchFailed`].
    pub async fn embed_with_retry(&self, batch_index: usize, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let timeout = self.config.request_timeout();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, self.provider.embed_batch(texts)).await {
                Ok(result) => result.and_then(|vectors| check_count(vectors, texts.len())),
                Err(_) => Err(Error::Timeout(timeout)),
            };

            match result {
                Ok(vectors) => {
                    if attempt > 1 {
                        tracing::info!(
                            "Embedding batch {} succeeded on attempt {}",
                            batch_index,
                            attempt
                        );
                    }
                    return Ok(vectors);
                }
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff(attempt);
                    tracing::warn!(
                        "Embedding batch {} attempt {}/{} failed: {}; retrying in {:?}",
                        batch_index,
                        attempt,
                        self.config.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        "Embedding batch {} failed after {} attempt(s): {}",
                        batch_index,
                        attempt,
                        e
                    );
                    return Err(Error::BatchFailed {
                        batch_index,
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// Embed all texts, one vector per text in input order
    ///
    /// Batches run concurrently up to `max_concurrency`; the first
    /// failed batch fails the whole call.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(self.plan_batches(texts.len()).into_iter().enumerate())
            .map(|(batch_index, range)| self.embed_with_retry(batch_index, &texts[range]))
            .buffered(self.config.max_concurrency)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    /// Embed a single query text
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_retry(0, &[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Provider returned no embedding"))
    }
}

fn check_count(vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(Error::Embedding(format!(
            "Provider returned {} embeddings for {} inputs",
            vectors.len(),
            expected
        )));
    }
    Ok(vectors)
}
