use super::*;
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

fn storage_config(backend: StorageBackend) -> StorageConfig {
    StorageConfig {
        backend,
        path: PathBuf::from("vectorstore"),
        collection: "rag_collection".to_string(),
    }
}

#[test]
fn simple_backend_opens_without_fallback() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let opened = open_backend(&storage_config(StorageBackend::Simple), temp_dir.path())
        .expect("should open simple backend");

    assert!(opened.fallback.is_none());
    assert_eq!(opened.backend.kind(), StorageBackend::Simple);
    assert!(opened.backend.is_empty().expect("is_empty should succeed"));
}

#[test]
fn lancedb_backend_opens_when_available() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let opened = open_backend(&storage_config(StorageBackend::LanceDb), temp_dir.path())
        .expect("should open lancedb backend");

    assert!(opened.fallback.is_none());
    assert_eq!(opened.backend.kind(), StorageBackend::LanceDb);
}

#[test]
fn unusable_lancedb_location_falls_back_to_simple() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store_dir = temp_dir.path().join("vectorstore");
    std::fs::create_dir_all(&store_dir).expect("should create store dir");
    // A plain file where the dataset directory should be
    std::fs::write(store_dir.join(LANCEDB_DIR), b"not a directory").expect("should write file");

    let opened = open_backend(&storage_config(StorageBackend::LanceDb), temp_dir.path())
        .expect("fallback should still produce a backend");

    let fallback = opened.fallback.expect("fallback should be reported");
    assert_eq!(fallback.requested, StorageBackend::LanceDb);
    assert!(!fallback.reason.is_empty());
    assert_eq!(opened.backend.kind(), StorageBackend::Simple);
}

#[test]
fn corrupt_simple_store_is_fatal_even_as_fallback() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store_dir = temp_dir.path().join("vectorstore");
    std::fs::create_dir_all(&store_dir).expect("should create store dir");
    std::fs::write(store_dir.join(LANCEDB_DIR), b"not a directory").expect("should write file");
    std::fs::write(store_dir.join(simple::METADATA_FILE), b"[]").expect("should write file");

    let result = open_backend(&storage_config(StorageBackend::LanceDb), temp_dir.path());

    assert!(matches!(result, Err(crate::RagError::Persistence(_))));
}

#[test]
fn absolute_store_path_ignores_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let absolute = temp_dir.path().join("elsewhere");
    let config = StorageConfig {
        path: absolute.clone(),
        ..storage_config(StorageBackend::Simple)
    };

    let mut opened = open_backend(&config, Path::new("/nonexistent/base"))
        .expect("should open simple backend");
    opened
        .backend
        .add(vec![vec![1.0]], vec![Metadata::new("t", "s")])
        .expect("add should succeed");
    opened.backend.save().expect("save should succeed");

    assert!(absolute.join(simple::VECTOR_FILE).exists());
}

#[test]
fn metadata_serializes_flat_with_extras() {
    let mut metadata = Metadata::new("hello", "https://example.com").with_chunk_id(3);
    metadata.extra.insert("title".to_string(), json!("Intro"));

    let value = serde_json::to_value(&metadata).expect("should serialize");

    assert_eq!(
        value,
        json!({"text": "hello", "source": "https://example.com", "chunk_id": 3, "title": "Intro"})
    );
    let back: Metadata = serde_json::from_value(value).expect("should deserialize");
    assert_eq!(back, metadata);
}

#[test]
fn metadata_without_chunk_id_omits_it() {
    let value = serde_json::to_value(Metadata::new("a", "b")).expect("should serialize");

    assert_eq!(value, json!({"text": "a", "source": "b"}));
}
