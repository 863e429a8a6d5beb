//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;
use crate::error::{Error, Result};

/// Trait for the external embedding service
///
/// Providers make one attempt per call. Batching across requests,
/// retries and timeouts are handled by [`crate::embeddings::Embedder`].
/// Failures worth retrying must be reported as errors for which
/// [`Error::is_transient`] returns true.
///
/// Implementations:
/// - `OpenAiEmbedder`: OpenAI-compatible `/embeddings` endpoint
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts, one vector per text, same order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Provider returned no embedding"))
    }

    /// Embedding dimensions, if known before the first call
    fn dimensions(&self) -> Option<usize>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
