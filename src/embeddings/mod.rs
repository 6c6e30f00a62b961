// Embeddings module
// Clients that turn texts into fixed-length vectors


pub mod ollama;
pub mod openai;

pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::{RagError, Result};

/// Embedding collaborator: one vector per input text, in input order.
///
/// Implementations must fail rather than return a reordered or truncated list.
pub trait Embedder: Send {
    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Model identifier, for logs and status output
    fn model(&self) -> &str;
}

/// Build the embedder selected by configuration
#[inline]
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Ollama => {
            let embedder =
                OllamaEmbedder::new(config).map_err(|e| RagError::Config(format!("{:#}", e)))?;
            Ok(Box::new(embedder))
        }
        EmbeddingBackend::OpenAi => {
            let api_key = std::env::var(&config.openai.api_key_env).map_err(|_| {
                RagError::Config(format!(
                    "OpenAI embedding backend selected but {} is not set",
                    config.openai.api_key_env
                ))
            })?;
            let embedder = OpenAiEmbedder::new(config, api_key)
                .map_err(|e| RagError::Config(format!("{:#}", e)))?;
            Ok(Box::new(embedder))
        }
    }
}
