//! Query and index filter types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::DocumentRef;

/// A natural-language question with optional metadata filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    /// The question to answer
    pub question: String,
    /// Restrict to one entity (case-insensitive)
    #[serde(default)]
    pub entity_id: Option<String>,
    /// Restrict to one filing form (case-insensitive)
    #[serde(default)]
    pub doc_type: Option<String>,
    /// Only search the latest filing date present for the filters above
    #[serde(default)]
    pub most_recent: bool,
}

impl Query {
    /// Create a query without filters
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// Restrict to an entity
    pub fn entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Restrict to a filing form
    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Restrict to the most recent filing
    pub fn most_recent(mut self) -> Self {
        self.most_recent = true;
        self
    }

    /// Metadata filter derived from the entity and doc type restrictions
    pub fn filter(&self) -> SearchFilter {
        SearchFilter {
            entity_id: normalize(self.entity_id.as_deref()),
            doc_type: normalize(self.doc_type.as_deref()),
            published_from: None,
            published_to: None,
        }
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Metadata restriction applied to index candidates before ranking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub entity_id: Option<String>,
    pub doc_type: Option<String>,
    /// Inclusive lower bound on the published date
    pub published_from: Option<NaiveDate>,
    /// Inclusive upper bound on the published date
    pub published_to: Option<NaiveDate>,
}

impl SearchFilter {
    /// Filter that accepts every record
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to exactly one published date
    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.published_from = Some(date);
        self.published_to = Some(date);
        self
    }

    /// Whether a record with this provenance passes the filter
    pub fn matches(&self, document: &DocumentRef) -> bool {
        if let Some(entity) = &self.entity_id {
            if !entity.eq_ignore_ascii_case(document.entity_id.trim()) {
                return false;
            }
        }
        if let Some(doc_type) = &self.doc_type {
            if !doc_type.eq_ignore_ascii_case(document.doc_type.trim()) {
                return false;
            }
        }
        if let Some(from) = self.published_from {
            if document.published_date < from {
                return false;
            }
        }
        if let Some(to) = self.published_to {
            if document.published_date > to {
                return false;
            }
        }
        true
    }
}
