//! Citations and answers handed back to the orchestration layer

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::RetrievalHit;

/// A numbered reference to one retrieved passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position in the rendered context
    pub index: usize,
    pub source_url: String,
    pub entity_id: String,
    pub doc_type: String,
    pub published_date: NaiveDate,
    pub similarity: f32,
}

impl Citation {
    pub fn from_hit(index: usize, hit: &RetrievalHit) -> Self {
        Self {
            index,
            source_url: hit.source_url.clone(),
            entity_id: hit.entity_id.clone(),
            doc_type: hit.doc_type.clone(),
            published_date: hit.published_date,
            similarity: hit.score,
        }
    }
}

/// Numbered citations for `hits`, in rank order
pub fn citations(hits: &[RetrievalHit]) -> Vec<Citation> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| Citation::from_hit(i + 1, hit))
        .collect()
}

/// Up to `limit` distinct source URLs, in rank order
pub fn distinct_sources(hits: &[RetrievalHit], limit: usize) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for hit in hits {
        if sources.len() == limit {
            break;
        }
        if !hit.source_url.is_empty() && !sources.contains(&hit.source_url) {
            sources.push(hit.source_url.clone());
        }
    }
    sources
}

/// Outcome of asking a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Answer {
    /// Generated from retrieved passages
    Grounded {
        text: String,
        citations: Vec<Citation>,
        sources: Vec<String>,
    },
    /// Nothing relevant was retrieved, so no answer was generated
    Declined { reason: String },
}

impl Answer {
    pub fn is_grounded(&self) -> bool {
        matches!(self, Answer::Grounded { .. })
    }
}
