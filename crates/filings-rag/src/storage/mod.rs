//! Durable bookkeeping for incremental indexing

mod fingerprints;

pub use fingerprints::FingerprintRegistry;
