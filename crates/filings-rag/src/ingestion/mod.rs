//! Turning filings into retrievable chunks

mod chunker;

pub use chunker::TextChunker;
