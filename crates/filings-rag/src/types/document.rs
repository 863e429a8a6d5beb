//! Filing and chunk types with provenance for citations

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A cleaned filing as handed over by the document store
///
/// The field aliases accept the upstream cleaner's JSON layout
/// (`ticker`, `filing_date`, `url`, `text`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Entity identifier (ticker or registrant id)
    #[serde(alias = "ticker")]
    pub entity_id: String,
    /// Filing form, e.g. `10-Q` or `8-K`
    pub doc_type: String,
    /// Date the filing was published
    #[serde(alias = "filing_date")]
    pub published_date: NaiveDate,
    /// Where the filing was fetched from
    #[serde(alias = "url", default)]
    pub source_url: String,
    /// Cleaned filing text
    #[serde(alias = "text")]
    pub raw_text: String,
}

impl Document {
    /// Create a new document
    pub fn new(
        entity_id: impl Into<String>,
        doc_type: impl Into<String>,
        published_date: NaiveDate,
        source_url: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            doc_type: doc_type.into(),
            published_date,
            source_url: source_url.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Provenance shared by every chunk of this document
    pub fn reference(&self) -> DocumentRef {
        DocumentRef {
            entity_id: self.entity_id.clone(),
            doc_type: self.doc_type.clone(),
            published_date: self.published_date,
            source_url: self.source_url.clone(),
        }
    }
}

/// Identity of the filing a chunk came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub entity_id: String,
    pub doc_type: String,
    pub published_date: NaiveDate,
    pub source_url: String,
}

/// Stable digest identifying a chunk for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// SHA-256 over the chunk's provenance and text
    ///
    /// Every field is length-prefixed so that adjacent fields cannot
    /// run into each other (`"AB" + "C"` vs `"A" + "BC"`).
    pub fn compute(
        document: &DocumentRef,
        offset_start: usize,
        offset_end: usize,
        text: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        let date = document.published_date.format("%Y-%m-%d").to_string();
        for field in [
            document.entity_id.as_bytes(),
            document.doc_type.as_bytes(),
            date.as_bytes(),
        ] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        hasher.update((offset_start as u64).to_le_bytes());
        hasher.update((offset_end as u64).to_le_bytes());
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already computed digest (e.g. read back from storage)
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bounded slice of a document, the unit of embedding and retrieval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Source filing
    pub document: DocumentRef,
    /// Start offset in characters (inclusive)
    pub offset_start: usize,
    /// End offset in characters (exclusive)
    pub offset_end: usize,
    /// Chunk text
    pub text: String,
    /// Dedup key
    pub content_hash: ContentHash,
}

impl Chunk {
    /// Create a chunk, deriving its content hash
    pub fn new(document: DocumentRef, offset_start: usize, offset_end: usize, text: String) -> Self {
        let content_hash = ContentHash::compute(&document, offset_start, offset_end, &text);
        Self {
            document,
            offset_start,
            offset_end,
            text,
            content_hash,
        }
    }
}
