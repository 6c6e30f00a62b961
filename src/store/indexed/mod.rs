
use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::{Metadata, SearchHit, VectorBackend};
use crate::config::StorageBackend;
use crate::{RagError, Result};

const VECTOR_COLUMN: &str = "vector";

/// Vector store backed by a LanceDB table.
///
/// LanceDB is async; this type owns a private current-thread runtime and
/// blocks on it, so it must not be used from inside another tokio runtime.
pub struct LanceDbStore {
    runtime: Runtime,
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

impl LanceDbStore {
    /// Connect to the dataset directory at `path`. The table itself is
    /// created on the first `add`, once the embedding dimension is known.
    #[inline]
    pub fn open(path: &Path, table_name: &str) -> Result<Self> {
        if table_name.trim().is_empty() {
            return Err(RagError::Config(
                "LanceDB table name cannot be empty".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RagError::Backend(format!("Failed to start LanceDB runtime: {}", e)))?;

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Backend(format!(
                "Failed to create LanceDB directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let uri = path.to_string_lossy().into_owned();
        debug!("Connecting to LanceDB at {}", uri);
        let connection = runtime
            .block_on(lancedb::connect(&uri).execute())
            .map_err(|e| RagError::Backend(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            runtime,
            connection,
            table_name: table_name.to_string(),
            vector_dimension: None,
        };

        if let Some(table) = store.existing_table()? {
            let dimension = store.runtime.block_on(detect_vector_dimension(&table))?;
            info!(
                "Opened LanceDB table '{}' with {} dimensions",
                store.table_name, dimension
            );
            store.vector_dimension = Some(dimension);
        }

        Ok(store)
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub const fn dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    /// Number of stored rows; 0 if the table has not been created yet
    #[inline]
    pub fn count(&self) -> Result<usize> {
        let Some(table) = self.existing_table()? else {
            return Ok(0);
        };
        self.runtime
            .block_on(table.count_rows(None))
            .map_err(|e| RagError::Backend(format!("Failed to count rows: {}", e)))
    }

    fn existing_table(&self) -> Result<Option<Table>> {
        self.runtime.block_on(async {
            let table_names = self
                .connection
                .table_names()
                .execute()
                .await
                .map_err(|e| RagError::Backend(format!("Failed to list tables: {}", e)))?;

            if !table_names.contains(&self.table_name) {
                return Ok(None);
            }

            self.connection
                .open_table(&self.table_name)
                .execute()
                .await
                .map(Some)
                .map_err(|e| RagError::Backend(format!("Failed to open table: {}", e)))
        })
    }

    #[inline]
    pub fn add(&mut self, embeddings: Vec<Vec<f32>>, metadatas: Vec<Metadata>) -> Result<()> {
        if embeddings.len() != metadatas.len() {
            return Err(RagError::RecordCountMismatch {
                embeddings: embeddings.len(),
                metadatas: metadatas.len(),
            });
        }
        let Some(first) = embeddings.first() else {
            debug!("No embeddings to store");
            return Ok(());
        };

        let vector_dim = self.vector_dimension.unwrap_or(first.len());
        if vector_dim == 0 {
            return Err(RagError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != vector_dim) {
            return Err(RagError::DimensionMismatch {
                expected: vector_dim,
                actual: bad.len(),
            });
        }

        let record_batch = create_record_batch(&embeddings, &metadatas, vector_dim)?;
        let count = embeddings.len();

        let table = match self.existing_table()? {
            Some(table) => table,
            None => {
                info!(
                    "Creating LanceDB table '{}' with {} dimensions",
                    self.table_name, vector_dim
                );
                self.runtime
                    .block_on(
                        self.connection
                            .create_empty_table(&self.table_name, create_schema(vector_dim)?)
                            .execute(),
                    )
                    .map_err(|e| RagError::Backend(format!("Failed to create table: {}", e)))?
            }
        };

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        self.runtime
            .block_on(table.add(reader).execute())
            .map_err(|e| RagError::Backend(format!("Failed to insert embeddings: {}", e)))?;

        self.vector_dimension = Some(vector_dim);
        info!("Stored {} embeddings in '{}'", count, self.table_name);
        Ok(())
    }

    #[inline]
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let Some(table) = self.existing_table()? else {
            return Ok(Vec::new());
        };
        if let Some(expected) = self.vector_dimension {
            if expected != query.len() {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        debug!("Searching '{}' with limit {}", self.table_name, top_k);
        self.runtime.block_on(async {
            let mut results = table
                .vector_search(query)
                .map_err(|e| RagError::Backend(format!("Failed to create vector search: {}", e)))?
                .column(VECTOR_COLUMN)
                .distance_type(DistanceType::Cosine)
                .limit(top_k)
                .execute()
                .await
                .map_err(|e| RagError::Backend(format!("Failed to execute search: {}", e)))?;

            let mut hits = Vec::new();
            while let Some(batch) = results
                .try_next()
                .await
                .map_err(|e| RagError::Backend(format!("Failed to read result stream: {}", e)))?
            {
                hits.extend(parse_search_batch(&batch)?);
            }
            Ok(hits)
        })
    }
}

impl VectorBackend for LanceDbStore {
    #[inline]
    fn add(&mut self, embeddings: Vec<Vec<f32>>, metadatas: Vec<Metadata>) -> Result<()> {
        Self::add(self, embeddings, metadatas)
    }

    #[inline]
    fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// Every `add` is already durable
    #[inline]
    fn save(&mut self) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        Self::search(self, query, top_k)
    }

    #[inline]
    fn kind(&self) -> StorageBackend {
        StorageBackend::LanceDb
    }
}

/// Map a distance (lower is better) onto a higher-is-better score in (0, 1]
#[inline]
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

async fn detect_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| RagError::Backend(format!("Failed to get table schema: {}", e)))?;

    match schema
        .field_with_name(VECTOR_COLUMN)
        .map(|field| field.data_type())
    {
        Ok(DataType::FixedSizeList(_, size)) => usize::try_from(*size)
            .map_err(|_| RagError::Backend(format!("Invalid vector dimension: {}", size))),
        _ => Err(RagError::Backend(
            "Could not find vector column or determine dimension".to_string(),
        )),
    }
}

fn list_size(vector_dim: usize) -> Result<i32> {
    i32::try_from(vector_dim)
        .map_err(|_| RagError::Backend(format!("Vector dimension {} is too large", vector_dim)))
}

fn create_schema(vector_dim: usize) -> Result<Arc<Schema>> {
    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                list_size(vector_dim)?,
            ),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk_id", DataType::UInt64, true),
        Field::new("extra", DataType::Utf8, false),
    ])))
}

fn create_record_batch(
    embeddings: &[Vec<f32>],
    metadatas: &[Metadata],
    vector_dim: usize,
) -> Result<RecordBatch> {
    let len = embeddings.len();

    let ids: Vec<String> = (0..len).map(|_| uuid::Uuid::new_v4().to_string()).collect();
    let mut texts = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut chunk_ids = Vec::with_capacity(len);
    let mut extras = Vec::with_capacity(len);
    for metadata in metadatas {
        texts.push(metadata.text.as_str());
        sources.push(metadata.source.as_str());
        chunk_ids.push(metadata.chunk_id);
        extras.push(
            serde_json::to_string(&metadata.extra)
                .map_err(|e| RagError::Backend(format!("Failed to encode metadata: {}", e)))?,
        );
    }

    let mut flat_values = Vec::with_capacity(len * vector_dim);
    for vector in embeddings {
        flat_values.extend_from_slice(vector);
    }
    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, list_size(vector_dim)?, Arc::new(values_array), None)
            .map_err(|e| RagError::Backend(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(sources)),
        Arc::new(UInt64Array::from(chunk_ids)),
        Arc::new(StringArray::from(extras)),
    ];

    RecordBatch::try_new(create_schema(vector_dim)?, arrays)
        .map_err(|e| RagError::Backend(format!("Failed to create record batch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Backend(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Backend(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
    let texts = string_column(batch, "text")?;
    let sources = string_column(batch, "source")?;
    let extras = string_column(batch, "extra")?;
    let chunk_ids = batch
        .column_by_name("chunk_id")
        .ok_or_else(|| RagError::Backend("Missing chunk_id column".to_string()))?
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| RagError::Backend("Invalid chunk_id column type".to_string()))?;
    let distances = batch
        .column_by_name("_distance")
        .ok_or_else(|| RagError::Backend("Missing _distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| RagError::Backend("Invalid _distance column type".to_string()))?;

    let mut hits = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let extra: Map<String, Value> = serde_json::from_str(extras.value(row))
            .map_err(|e| RagError::Backend(format!("Corrupt extra metadata: {}", e)))?;
        let metadata = Metadata {
            text: texts.value(row).to_string(),
            source: sources.value(row).to_string(),
            chunk_id: (!chunk_ids.is_null(row)).then(|| chunk_ids.value(row)),
            extra,
        };

        if distances.is_null(row) {
            return Err(RagError::Backend(format!("Null distance in search row {}", row)));
        }
        let distance = distances.value(row);

        hits.push(SearchHit {
            score: distance_to_score(distance),
            metadata,
        });
    }

    Ok(hits)
}
