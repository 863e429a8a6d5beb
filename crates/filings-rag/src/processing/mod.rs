//! Incremental indexing: chunk, skip known, embed, commit

mod pipeline;
mod reconcile;

pub use pipeline::IndexingPipeline;
pub use reconcile::reconcile;
