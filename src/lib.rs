use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dimension mismatch: store holds {expected}-dimensional embeddings, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Record count mismatch: {embeddings} embeddings but {metadatas} metadata entries")]
    RecordCountMismatch { embeddings: usize, metadatas: usize },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("{collaborator} error for '{input}': {message}")]
    Collaborator {
        collaborator: Collaborator,
        input: String,
        message: String,
    },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// External services the pipeline depends on but does not implement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    TextSource,
    Embedder,
    Generator,
}

impl fmt::Display for Collaborator {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TextSource => "Text source",
            Self::Embedder => "Embedder",
            Self::Generator => "Answer generator",
        };
        f.write_str(name)
    }
}

const MAX_INPUT_PREVIEW_CHARS: usize = 80;

impl RagError {
    /// Wrap a collaborator failure, keeping a short preview of the input that caused it
    #[inline]
    pub fn collaborator(collaborator: Collaborator, input: &str, error: &anyhow::Error) -> Self {
        let mut preview: String = input.chars().take(MAX_INPUT_PREVIEW_CHARS).collect();
        if input.chars().count() > MAX_INPUT_PREVIEW_CHARS {
            preview.push_str("...");
        }
        Self::Collaborator {
            collaborator,
            input: preview,
            message: format!("{:#}", error),
        }
    }
}

impl From<config::ConfigError> for RagError {
    #[inline]
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod http;
pub mod pipeline;
pub mod sources;
pub mod store;
