//! Sliding-window text chunking with character offsets

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{Chunk, Document};

/// Text chunker with configurable window size and overlap
///
/// Windows are cut on character (not byte) positions, left to right:
/// each window is at most `max_chars` long and the next one starts
/// `overlap_chars` before the previous end. Boundaries depend only on
/// the text length and the configuration, so reprocessing a document
/// reproduces the same offsets and content hashes.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    max_chars: usize,
    /// Characters repeated between consecutive chunks
    overlap_chars: usize,
}

impl TextChunker {
    /// Create a new chunker, rejecting overlaps that would stall the window
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        ChunkingConfig {
            max_chars,
            overlap_chars,
        }
        .validate()?;

        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    /// Create from config
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.max_chars, config.overlap_chars)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Chunk a document
    ///
    /// Whitespace is trimmed from each window and the offsets follow the
    /// trimmed text. Windows holding only whitespace are dropped, so an
    /// empty or blank document yields no chunks.
    pub fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let text = doc.raw_text.as_str();
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Byte position of every character, plus the end of the text
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;

        let document = doc.reference();
        let mut chunks = Vec::with_capacity(total / (self.max_chars - self.overlap_chars) + 1);
        let mut start = 0usize;

        loop {
            let end = (start + self.max_chars).min(total);
            let window = &text[bounds[start]..bounds[end]];

            let leading = window.chars().take_while(|c| c.is_whitespace()).count();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                let offset_start = start + leading;
                let offset_end = offset_start + trimmed.chars().count();
                chunks.push(Chunk::new(
                    document.clone(),
                    offset_start,
                    offset_end,
                    trimmed.to_string(),
                ));
            }

            if end == total {
                break;
            }
            start = end - self.overlap_chars;
        }

        chunks
    }
}
