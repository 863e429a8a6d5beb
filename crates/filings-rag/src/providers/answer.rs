//! Answer generator trait, the downstream consumer of retrieval results

use async_trait::async_trait;

use crate::error::Result;
use crate::generation::Citation;

/// Trait for turning retrieved context into an answer
///
/// Only called when retrieval produced at least one passage.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer grounded in `context`
    async fn generate(&self, question: &str, context: &str, citations: &[Citation]) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
