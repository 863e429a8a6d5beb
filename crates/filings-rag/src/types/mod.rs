//! Core types for filings, chunks, queries, and results

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, ContentHash, Document, DocumentRef};
pub use query::{Query, SearchFilter};
pub use response::{BatchFailure, IndexStats, IndexingReport, ReconcileReport, RetrievalHit};
