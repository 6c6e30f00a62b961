
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// A contiguous window of source words, identified by (source, index)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Origin identifier (URL or file path)
    pub source: String,
    /// Position of this chunk within its source, starting at 0
    pub index: usize,
    /// The window's words joined by single spaces
    pub text: String,
}

/// Word-window chunking parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum number of words per chunk
    pub chunk_size: usize,
    /// Number of trailing words repeated at the start of the next chunk
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 80,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// The overlap must leave a positive step, otherwise chunking never advances
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be at least 1".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    #[inline]
    pub const fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Split text on whitespace into overlapping windows of `chunk_size` words.
///
/// Window starts advance by `chunk_size - chunk_overlap`; the last window
/// may be shorter. Empty or whitespace-only text yields no chunks.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    let config = ChunkingConfig::new(chunk_size, chunk_overlap)?;
    let words = text.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let step = config.step();
    let chunks = (0..words.len())
        .step_by(step)
        .map(|start| {
            let end = (start + config.chunk_size).min(words.len());
            words[start..end].join(" ")
        })
        .collect::<Vec<_>>();

    debug!(
        "Split {} words into {} chunks (size {}, overlap {})",
        words.len(),
        chunks.len(),
        chunk_size,
        chunk_overlap
    );

    Ok(chunks)
}

/// Chunk a whole document, tagging each window with its source and index
#[inline]
pub fn chunk_document(source: &str, text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let chunks = chunk_text(text, config.chunk_size, config.chunk_overlap)?
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            source: source.to_string(),
            index,
            text,
        })
        .collect();
    Ok(chunks)
}

/// Number of chunks `chunk_text` produces for `word_count` words.
///
/// Every window start below `word_count` emits a chunk, including a final
/// window made up entirely of words already seen in the previous one.
#[inline]
pub fn expected_chunk_count(word_count: usize, chunk_size: usize, chunk_overlap: usize) -> Result<usize> {
    let config = ChunkingConfig::new(chunk_size, chunk_overlap)?;
    Ok(word_count.div_ceil(config.step()))
}
