
use arrow::array::{Array, ArrayRef, Float32Array, Float32Builder, ListArray, ListBuilder};
use arrow::datatypes::{Field, Schema};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::similarity;
use super::{Metadata, Record, SearchHit, VectorBackend};
use crate::config::StorageBackend;
use crate::{RagError, Result};

/// Arrow IPC file holding one `List<Float32>` row per record
pub const VECTOR_FILE: &str = "vectors.arrow";
/// JSON array of metadata objects, in the same order as the vector file
pub const METADATA_FILE: &str = "metadatas.json";

const EMBEDDING_COLUMN: &str = "embedding";

/// In-memory record store with exact cosine search, persisted as a pair of files
#[derive(Debug)]
pub struct SimpleVectorStore {
    path: PathBuf,
    records: Vec<Record>,
    dimension: Option<usize>,
}

impl SimpleVectorStore {
    /// Open the store at `path`, loading previously saved records if present.
    ///
    /// The directory is created lazily by `save`.
    #[inline]
    pub fn open(path: &Path) -> Result<Self> {
        let vectors_path = path.join(VECTOR_FILE);
        let metadata_path = path.join(METADATA_FILE);

        let records = match (vectors_path.exists(), metadata_path.exists()) {
            (false, false) => {
                debug!("No persisted store at {}, starting empty", path.display());
                Vec::new()
            }
            (true, true) => load_records(&vectors_path, &metadata_path)?,
            (true, false) => {
                return Err(RagError::Persistence(format!(
                    "{} exists but {} is missing",
                    vectors_path.display(),
                    metadata_path.display()
                )));
            }
            (false, true) => {
                return Err(RagError::Persistence(format!(
                    "{} exists but {} is missing",
                    metadata_path.display(),
                    vectors_path.display()
                )));
            }
        };

        let dimension = records.first().map(|r| r.embedding.len());
        if !records.is_empty() {
            info!(
                "Loaded {} records ({} dimensions) from {}",
                records.len(),
                dimension.unwrap_or_default(),
                path.display()
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            records,
            dimension,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dimensionality fixed by the first record ever added
    #[inline]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Append records in input order.
    ///
    /// Everything is validated before the first record is appended, so a
    /// failed call leaves the store untouched.
    #[inline]
    pub fn add(&mut self, embeddings: Vec<Vec<f32>>, metadatas: Vec<Metadata>) -> Result<()> {
        if embeddings.len() != metadatas.len() {
            return Err(RagError::RecordCountMismatch {
                embeddings: embeddings.len(),
                metadatas: metadatas.len(),
            });
        }
        let Some(first) = embeddings.first() else {
            return Ok(());
        };

        let expected = self.dimension.unwrap_or(first.len());
        if expected == 0 {
            return Err(RagError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let added = embeddings.len();
        self.records.extend(
            embeddings
                .into_iter()
                .zip(metadatas)
                .map(|(embedding, metadata)| Record {
                    embedding,
                    metadata,
                }),
        );
        self.dimension = Some(expected);

        debug!("Added {} records, store now holds {}", added, self.records.len());
        Ok(())
    }

    /// Write both files.
    ///
    /// Both are fully written and synced to temp siblings before either is
    /// renamed into place, so a failed save leaves the previous pair loadable.
    #[inline]
    pub fn save(&self) -> Result<()> {
        let vectors = encode_vectors(&self.records)?;
        let metadatas: Vec<&Metadata> = self.records.iter().map(|r| &r.metadata).collect();
        let metadata_json = serde_json::to_vec_pretty(&metadatas)
            .map_err(|e| RagError::Persistence(format!("Failed to serialize metadata: {}", e)))?;

        fs::create_dir_all(&self.path).map_err(|e| {
            RagError::Persistence(format!(
                "Failed to create store directory {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let staged_vectors = stage(&self.path.join(VECTOR_FILE), &vectors)?;
        let staged_metadata = match stage(&self.path.join(METADATA_FILE), &metadata_json) {
            Ok(staged) => staged,
            Err(e) => {
                staged_vectors.discard();
                return Err(e);
            }
        };

        if let Err(e) = staged_vectors.commit() {
            staged_metadata.discard();
            return Err(e);
        }
        staged_metadata.commit()?;
        sync_dir(&self.path);

        info!(
            "Saved {} records to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Exact cosine search over every record
    #[inline]
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if self.records.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let ranked = similarity::rank(
            query,
            self.records.iter().map(|r| r.embedding.as_slice()),
            top_k,
        )?;

        Ok(ranked
            .into_iter()
            .filter_map(|(position, score)| {
                self.records.get(position).map(|record| SearchHit {
                    score,
                    metadata: record.metadata.clone(),
                })
            })
            .collect())
    }
}

impl VectorBackend for SimpleVectorStore {
    #[inline]
    fn add(&mut self, embeddings: Vec<Vec<f32>>, metadatas: Vec<Metadata>) -> Result<()> {
        Self::add(self, embeddings, metadatas)
    }

    #[inline]
    fn is_empty(&self) -> Result<bool> {
        Ok(Self::is_empty(self))
    }

    #[inline]
    fn save(&mut self) -> Result<()> {
        Self::save(self)
    }

    #[inline]
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        Self::search(self, query, top_k)
    }

    #[inline]
    fn kind(&self) -> StorageBackend {
        StorageBackend::Simple
    }
}

fn encode_vectors(records: &[Record]) -> Result<Vec<u8>> {
    let mut builder = ListBuilder::new(Float32Builder::new());
    for record in records {
        builder.values().append_slice(&record.embedding);
        builder.append(true);
    }
    let list = builder.finish();

    let schema = Arc::new(Schema::new(vec![Field::new(
        EMBEDDING_COLUMN,
        list.data_type().clone(),
        false,
    )]));
    let column: ArrayRef = Arc::new(list);
    let batch = RecordBatch::try_new(Arc::clone(&schema), vec![column])
        .map_err(|e| RagError::Persistence(format!("Failed to build vector batch: {}", e)))?;

    let mut buffer = Vec::new();
    {
        let mut writer = FileWriter::try_new(&mut buffer, &schema)
            .map_err(|e| RagError::Persistence(format!("Failed to start vector file: {}", e)))?;
        writer
            .write(&batch)
            .map_err(|e| RagError::Persistence(format!("Failed to write vectors: {}", e)))?;
        writer
            .finish()
            .map_err(|e| RagError::Persistence(format!("Failed to finish vector file: {}", e)))?;
    }
    Ok(buffer)
}

fn decode_vectors(bytes: Vec<u8>) -> Result<Vec<Vec<f32>>> {
    let reader = FileReader::try_new(Cursor::new(bytes), None)
        .map_err(|e| RagError::Persistence(format!("Unreadable vector file: {}", e)))?;

    let mut embeddings = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| RagError::Persistence(format!("Corrupt vector batch: {}", e)))?;
        let column = batch
            .column_by_name(EMBEDDING_COLUMN)
            .ok_or_else(|| RagError::Persistence("Missing embedding column".to_string()))?;
        let lists = column
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| RagError::Persistence("Invalid embedding column type".to_string()))?;

        for row in 0..lists.len() {
            if lists.is_null(row) {
                return Err(RagError::Persistence(format!(
                    "Null embedding at row {}",
                    embeddings.len()
                )));
            }
            let values = lists.value(row);
            let floats = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| RagError::Persistence("Embedding values are not f32".to_string()))?;
            if floats.null_count() > 0 {
                return Err(RagError::Persistence(format!(
                    "Null component in embedding at row {}",
                    embeddings.len()
                )));
            }
            embeddings.push(floats.values().to_vec());
        }
    }
    Ok(embeddings)
}

fn load_records(vectors_path: &Path, metadata_path: &Path) -> Result<Vec<Record>> {
    let vector_bytes = fs::read(vectors_path).map_err(|e| {
        RagError::Persistence(format!("Failed to read {}: {}", vectors_path.display(), e))
    })?;
    let embeddings = decode_vectors(vector_bytes)?;

    let metadata_bytes = fs::read(metadata_path).map_err(|e| {
        RagError::Persistence(format!("Failed to read {}: {}", metadata_path.display(), e))
    })?;
    let metadatas: Vec<Metadata> = serde_json::from_slice(&metadata_bytes).map_err(|e| {
        RagError::Persistence(format!("Corrupt metadata file {}: {}", metadata_path.display(), e))
    })?;

    if embeddings.len() != metadatas.len() {
        return Err(RagError::Persistence(format!(
            "Store files disagree: {} embeddings but {} metadata entries",
            embeddings.len(),
            metadatas.len()
        )));
    }

    if let Some(first) = embeddings.first() {
        let dimension = first.len();
        if dimension == 0 {
            return Err(RagError::Persistence(
                "Stored embeddings have zero length".to_string(),
            ));
        }
        if let Some((row, bad)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, e)| e.len() != dimension)
        {
            return Err(RagError::Persistence(format!(
                "Mixed dimensionality on disk: row {} has {} values, expected {}",
                row,
                bad.len(),
                dimension
            )));
        }
    }

    Ok(embeddings
        .into_iter()
        .zip(metadatas)
        .map(|(embedding, metadata)| Record {
            embedding,
            metadata,
        })
        .collect())
}

/// A fully written and synced temp file waiting to be renamed over `target`
struct StagedFile {
    tmp_path: PathBuf,
    target: PathBuf,
}

impl StagedFile {
    fn commit(self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.target).map_err(|e| {
            let _ = fs::remove_file(&self.tmp_path);
            RagError::Persistence(format!("Failed to replace {}: {}", self.target.display(), e))
        })
    }

    fn discard(self) {
        let _ = fs::remove_file(&self.tmp_path);
    }
}

fn stage(target: &Path, bytes: &[u8]) -> Result<StagedFile> {
    let mut tmp_name = target.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let write = || -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()
    };

    match write() {
        Ok(()) => Ok(StagedFile {
            tmp_path,
            target: target.to_path_buf(),
        }),
        Err(e) => {
            if tmp_path.is_file() {
                let _ = fs::remove_file(&tmp_path);
            }
            Err(RagError::Persistence(format!(
                "Failed to write {}: {}",
                tmp_path.display(),
                e
            )))
        }
    }
}

/// Persist the renames themselves. Best effort: not every platform can
/// open a directory for syncing.
fn sync_dir(path: &Path) {
    if let Ok(dir) = File::open(path) {
        if let Err(e) = dir.sync_all() {
            debug!("Could not sync store directory {}: {}", path.display(), e);
        }
    }
}
