// Retrieval pipeline
// Owns the configured collaborators and store, and runs ingestion and retrieval


use tracing::{debug, info, warn};

use crate::chunking::chunk_document;
use crate::config::Config;
use crate::embeddings::{Embedder, build_embedder};
use crate::generation::{AnswerGenerator, ContextPassage, build_generator, join_passages};
use crate::sources::{SourceRouter, TextSource};
use crate::store::{
    BackendFallback, Metadata, OpenedBackend, SearchHit, VectorBackend, open_backend,
};
use crate::{Collaborator, RagError, Result};

/// External services the pipeline delegates to
pub struct Collaborators {
    pub source: Box<dyn TextSource>,
    pub embedder: Box<dyn Embedder>,
    pub generator: Box<dyn AnswerGenerator>,
}

/// Outcome of ingesting one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub source: String,
    /// Number of chunks embedded and stored; 0 when the text had no words
    pub chunks: usize,
}

/// A generated answer together with the hits it was grounded on
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    /// Source of each hit, in rank order
    pub sources: Vec<String>,
    pub hits: Vec<SearchHit>,
    /// Set when generation failed and `answer` fell back to the raw passages
    pub generation_error: Option<String>,
}

/// Everything one process run needs: a validated configuration, the
/// collaborators it selects and the opened store.
///
/// The store does no locking of its own; `&mut self` on the ingestion
/// methods keeps a single writer per context.
pub struct RagContext {
    config: Config,
    collaborators: Collaborators,
    store: OpenedBackend,
}

impl RagContext {
    /// Build every component from configuration
    #[inline]
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let collaborators = Collaborators {
            source: Box::new(SourceRouter::default()),
            embedder: build_embedder(&config.embedding)?,
            generator: build_generator(&config.generation)?,
        };
        let store = open_backend(&config.storage, config.get_base_dir())?;

        Self::new(config, collaborators, store)
    }

    /// Assemble a context from already-constructed parts
    #[inline]
    pub fn new(config: Config, collaborators: Collaborators, store: OpenedBackend) -> Result<Self> {
        config.validate()?;
        debug!(
            "Pipeline ready: {} backend, embedding model {}",
            store.backend.kind(),
            collaborators.embedder.model()
        );
        Ok(Self {
            config,
            collaborators,
            store,
        })
    }

    #[inline]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn backend(&self) -> &dyn VectorBackend {
        self.store.backend.as_ref()
    }

    /// Why the configured backend was replaced, if it was
    #[inline]
    pub const fn fallback(&self) -> Option<&BackendFallback> {
        self.store.fallback.as_ref()
    }

    /// Fetch `identifier` through the text source and ingest its text
    #[inline]
    pub fn ingest(&mut self, identifier: &str) -> Result<IngestReport> {
        let text = self
            .collaborators
            .source
            .fetch(identifier)
            .map_err(|e| RagError::collaborator(Collaborator::TextSource, identifier, &e))?;
        self.ingest_text(identifier, &text)
    }

    /// Chunk, embed, add and save. Text without words stores nothing and
    /// calls neither the embedder nor `save`.
    #[inline]
    pub fn ingest_text(&mut self, source: &str, text: &str) -> Result<IngestReport> {
        let chunks = chunk_document(source, text, &self.config.chunking)?;
        if chunks.is_empty() {
            info!("No text to ingest from {}", source);
            return Ok(IngestReport {
                source: source.to_string(),
                chunks: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embed(source, &texts)?;

        let metadatas = chunks
            .into_iter()
            .map(|chunk| Metadata::new(chunk.text, chunk.source).with_chunk_id(chunk.index as u64))
            .collect();

        let count = texts.len();
        self.store.backend.add(embeddings, metadatas)?;
        self.store.backend.save()?;

        info!("Ingested {} chunks from {}", count, source);
        Ok(IngestReport {
            source: source.to_string(),
            chunks: count,
        })
    }

    /// Embed the query and return the backend's hits unchanged, best first
    #[inline]
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".to_string()));
        }

        let mut embeddings = self.embed(query, &[query.to_string()])?;
        let query_embedding = embeddings.pop().ok_or_else(|| {
            RagError::collaborator(
                Collaborator::Embedder,
                query,
                &anyhow::anyhow!("no embedding returned for query"),
            )
        })?;

        let hits = self.store.backend.search(&query_embedding, top_k)?;
        debug!("Retrieved {} hits for query", hits.len());
        Ok(hits)
    }

    /// Retrieve, then ask the generator for a grounded answer. A generation
    /// failure still returns the hits, with the passages as the answer.
    #[inline]
    pub fn answer(&self, query: &str, top_k: usize) -> Result<Answer> {
        let hits = self.retrieve(query, top_k)?;
        let passages: Vec<ContextPassage> = hits
            .iter()
            .map(|hit| ContextPassage {
                text: hit.metadata.text.clone(),
                source: hit.metadata.source.clone(),
            })
            .collect();
        let sources = passages.iter().map(|p| p.source.clone()).collect();

        let (answer, generation_error) =
            match self.collaborators.generator.generate(query, &passages) {
                Ok(answer) => (answer, None),
                Err(e) => {
                    let error = RagError::collaborator(Collaborator::Generator, query, &e);
                    warn!("{}; answering with retrieved passages", error);
                    (join_passages(&passages), Some(error.to_string()))
                }
            };

        Ok(Answer {
            answer,
            sources,
            hits,
            generation_error,
        })
    }

    /// Embed `texts`, insisting on exactly one vector per text
    fn embed(&self, input: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self
            .collaborators
            .embedder
            .embed(texts)
            .map_err(|e| RagError::collaborator(Collaborator::Embedder, input, &e))?;

        if embeddings.len() != texts.len() {
            return Err(RagError::collaborator(
                Collaborator::Embedder,
                input,
                &anyhow::anyhow!(
                    "returned {} embeddings for {} texts",
                    embeddings.len(),
                    texts.len()
                ),
            ));
        }
        Ok(embeddings)
    }
}
