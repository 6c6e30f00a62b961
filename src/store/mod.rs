// Vector storage module
// Record types, the backend interface and backend selection

#[cfg(test)]
mod tests;

pub mod indexed;
pub mod similarity;
pub mod simple;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

use crate::Result;
use crate::config::{StorageBackend, StorageConfig};

pub use indexed::LanceDbStore;
pub use simple::SimpleVectorStore;

/// Directory under the store path that holds the LanceDB dataset
pub const LANCEDB_DIR: &str = "lancedb";

/// Metadata stored alongside each embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// The chunk's source text
    pub text: String,
    /// Origin identifier: URL or file path
    pub source: String,
    /// Position of the chunk within its source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<u64>,
    /// Any other fields, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    #[inline]
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            chunk_id: None,
            extra: Map::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_chunk_id(mut self, chunk_id: u64) -> Self {
        self.chunk_id = Some(chunk_id);
        self
    }
}

/// An embedding paired with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Higher is better. Cosine similarity for the simple backend,
    /// an opaque monotonic transform of distance for indexed backends.
    pub score: f32,
    pub metadata: Metadata,
}

/// Storage and search capability shared by every backend.
///
/// Implementations do no internal locking: one writer at a time, and no
/// search while an `add`/`save` is in flight.
pub trait VectorBackend: Send {
    /// Append records in input order. Fails without side effects on a
    /// count or dimension mismatch.
    fn add(&mut self, embeddings: Vec<Vec<f32>>, metadatas: Vec<Metadata>) -> Result<()>;

    fn is_empty(&self) -> Result<bool>;

    /// Persist everything added so far. Safe to call repeatedly.
    fn save(&mut self) -> Result<()>;

    /// At most `top_k` hits, best first
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>>;

    fn kind(&self) -> StorageBackend;
}

/// Why a requested backend was replaced by the simple store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFallback {
    pub requested: StorageBackend,
    pub reason: String,
}

/// The active backend, plus the fallback that produced it if any
pub struct OpenedBackend {
    pub backend: Box<dyn VectorBackend>,
    pub fallback: Option<BackendFallback>,
}

impl OpenedBackend {
    #[inline]
    pub fn new(backend: Box<dyn VectorBackend>) -> Self {
        Self {
            backend,
            fallback: None,
        }
    }
}

/// Open the configured backend.
///
/// If the indexed backend cannot be constructed, the simple store at the same
/// location is opened instead and the reason is logged and returned. Failures
/// opening the simple store itself are always fatal.
#[inline]
pub fn open_backend(config: &StorageConfig, base_dir: &Path) -> Result<OpenedBackend> {
    let store_path = config.resolved_path(base_dir);

    match config.backend {
        StorageBackend::Simple => {
            let store = SimpleVectorStore::open(&store_path)?;
            Ok(OpenedBackend::new(Box::new(store)))
        }
        StorageBackend::LanceDb => {
            match LanceDbStore::open(&store_path.join(LANCEDB_DIR), &config.collection) {
                Ok(store) => {
                    info!(
                        "Using LanceDB backend, collection '{}'",
                        config.collection
                    );
                    Ok(OpenedBackend::new(Box::new(store)))
                }
                Err(e) => {
                    warn!(
                        "LanceDB backend unavailable, falling back to simple vector store at {}: {}",
                        store_path.display(),
                        e
                    );
                    let store = SimpleVectorStore::open(&store_path)?;
                    Ok(OpenedBackend {
                        backend: Box::new(store),
                        fallback: Some(BackendFallback {
                            requested: StorageBackend::LanceDb,
                            reason: e.to_string(),
                        }),
                    })
                }
            }
        }
    }
}
