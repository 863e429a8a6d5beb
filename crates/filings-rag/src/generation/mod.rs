//! Grounded answer context for the downstream answer generator

pub mod citation;
pub mod prompt;

pub use citation::{citations, distinct_sources, Answer, Citation};
pub use prompt::PromptBuilder;

/// Source URLs listed alongside an answer
pub const MAX_SOURCES: usize = 5;
