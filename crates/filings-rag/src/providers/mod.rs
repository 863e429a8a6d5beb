//! Provider abstractions for embeddings, vector storage, document intake
//! and answer generation
//!
//! Trait seams let the pipeline run against the hosted embedding service
//! and local SQLite storage in production, and against in-process fakes
//! in tests.

pub mod answer;
pub mod document_store;
pub mod embedding;
pub mod local;
pub mod openai;
pub mod vector_index;

pub use answer::AnswerGenerator;
pub use document_store::{DocumentBatch, DocumentStore};
pub use embedding::EmbeddingProvider;
pub use local::{DirectoryDocumentStore, LocalVectorIndex, MemoryDocumentStore};
pub use openai::OpenAiEmbedder;
pub use vector_index::{AddOutcome, EmbeddingRecord, ScoredChunk, VectorIndex};
