//! Vector storage and query-time retrieval

mod retriever;
mod vector_store;

pub use retriever::Retriever;
pub use vector_store::VectorStore;
