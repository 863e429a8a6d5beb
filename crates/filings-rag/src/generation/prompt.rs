//! Prompt templates for grounded answer generation

use crate::types::RetrievalHit;

/// Separator between passages in the rendered context
pub const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Prompt builder for filings questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Render passages as `[ENTITY | DOC_TYPE | DATE] text` blocks
    pub fn build_context(hits: &[RetrievalHit]) -> String {
        hits.iter()
            .map(|hit| {
                format!(
                    "[{} | {} | {}] {}",
                    hit.entity_id,
                    hit.doc_type,
                    hit.published_date.format("%Y-%m-%d"),
                    hit.text
                )
            })
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR)
    }
}
