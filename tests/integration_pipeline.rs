#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end ingestion and retrieval against a mocked embedding service

use docs_rag::config::{Config, StorageBackend};
use docs_rag::pipeline::RagContext;
use docs_rag::{Collaborator, RagError};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{method, path},
};

const RUST_DOC: &str = "Rust is a systems programming language focused on safety speed and \
concurrency. The borrow checker enforces ownership rules at compile time.";

const GARDEN_DOC: &str = "Tomatoes need full sun and regular watering. Mulch keeps the soil \
moist and suppresses weeds in the vegetable garden.";

/// Embeds each text as counts of a few marker words plus a constant bias
/// component, so ranking is predictable and no vector is zero
fn keyword_embeddings(request: &Request) -> ResponseTemplate {
    const KEYWORDS: [&str; 4] = ["rust", "borrow", "tomatoes", "soil"];
    const BIAS: f32 = 0.1;

    let body: Value = serde_json::from_slice(&request.body).expect("request body should be JSON");
    let embeddings: Vec<Vec<f32>> = body["input"]
        .as_array()
        .expect("input should be an array")
        .iter()
        .map(|text| {
            let text = text.as_str().expect("inputs should be strings").to_lowercase();
            KEYWORDS
                .iter()
                .map(|keyword| text.matches(keyword).count() as f32)
                .chain(std::iter::once(BIAS))
                .collect()
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
}

async fn mock_embedding_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(keyword_embeddings)
        .mount(&server)
        .await;
    server
}

fn write_config(base_dir: &Path, server: &MockServer, storage: StorageBackend) -> Config {
    let toml = format!(
        r#"
[embedding]
backend = "ollama"
model = "test-embed"

[embedding.ollama]
host = "127.0.0.1"
port = {port}

[storage]
backend = "{storage}"

[chunking]
chunk_size = 12
chunk_overlap = 2

[retrieval]
top_k = 2
"#,
        port = server.address().port(),
        storage = storage,
    );
    fs::create_dir_all(base_dir).expect("should create base dir");
    fs::write(base_dir.join("config.toml"), toml).expect("should write config");
    Config::load_file(base_dir).expect("config should load")
}

fn write_docs(dir: &Path) -> (String, String) {
    let rust = dir.join("rust.txt");
    let garden = dir.join("garden.txt");
    fs::write(&rust, RUST_DOC).expect("should write doc");
    fs::write(&garden, GARDEN_DOC).expect("should write doc");
    (
        rust.to_string_lossy().into_owned(),
        garden.to_string_lossy().into_owned(),
    )
}

/// Runs blocking pipeline code off the async test runtime. A plain thread is
/// used because the LanceDB backend starts its own runtime.
async fn run_blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let handle = std::thread::spawn(f);
    tokio::task::spawn_blocking(move || handle.join().expect("worker thread should not panic"))
        .await
        .expect("join task should complete")
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_then_answer_from_files() {
    let server = mock_embedding_server().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = write_config(temp_dir.path(), &server, StorageBackend::Simple);
    let (rust_doc, garden_doc) = write_docs(temp_dir.path());

    let answer = run_blocking(move || {
        let mut context = RagContext::from_config(config).expect("context should build");
        let rust = context.ingest(&rust_doc).expect("rust doc should ingest");
        let garden = context.ingest(&garden_doc).expect("garden doc should ingest");
        assert_eq!(rust.chunks, 3);
        assert_eq!(garden.chunks, 2);

        context
            .answer("How does Rust stay safe?", 1)
            .expect("answer should succeed")
    })
    .await;

    assert_eq!(answer.hits.len(), 1);
    assert!(answer.sources[0].ends_with("rust.txt"));
    assert!(answer.answer.contains("Rust"));
    assert!(answer.generation_error.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn store_survives_restart() {
    let server = mock_embedding_server().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = write_config(temp_dir.path(), &server, StorageBackend::Simple);
    let (_, garden_doc) = write_docs(temp_dir.path());

    let first_config = config.clone();
    run_blocking(move || {
        let mut context = RagContext::from_config(first_config).expect("context should build");
        context.ingest(&garden_doc).expect("garden doc should ingest");
    })
    .await;

    let hits = run_blocking(move || {
        let context = RagContext::from_config(config).expect("context should rebuild");
        context
            .retrieve("when do tomatoes need soil", 5)
            .expect("retrieve should succeed")
    })
    .await;

    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.metadata.source.ends_with("garden.txt")));
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test(flavor = "multi_thread")]
async fn lancedb_backend_end_to_end() {
    let server = mock_embedding_server().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = write_config(temp_dir.path(), &server, StorageBackend::LanceDb);
    let (rust_doc, garden_doc) = write_docs(temp_dir.path());

    let hits = run_blocking(move || {
        let mut context = RagContext::from_config(config).expect("context should build");
        assert!(context.fallback().is_none());
        assert_eq!(context.backend().kind(), StorageBackend::LanceDb);

        context.ingest(&rust_doc).expect("rust doc should ingest");
        context.ingest(&garden_doc).expect("garden doc should ingest");
        context
            .retrieve("tomatoes", 2)
            .expect("retrieve should succeed")
    })
    .await;

    assert_eq!(hits.len(), 2);
    assert!(hits[0].metadata.source.ends_with("garden.txt"));
    assert!(hits.iter().all(|h| h.score > 0.0 && h.score <= 1.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_outage_is_a_collaborator_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = write_config(temp_dir.path(), &server, StorageBackend::Simple);
    let (rust_doc, _) = write_docs(temp_dir.path());

    let result = run_blocking(move || {
        let mut context = RagContext::from_config(config).expect("context should build");
        context.ingest(&rust_doc)
    })
    .await;

    assert!(matches!(
        result,
        Err(RagError::Collaborator {
            collaborator: Collaborator::Embedder,
            ..
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_file_is_a_text_source_error() {
    let server = mock_embedding_server().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = write_config(temp_dir.path(), &server, StorageBackend::Simple);
    let missing = temp_dir.path().join("nope.txt").to_string_lossy().into_owned();

    let result = run_blocking(move || {
        let mut context = RagContext::from_config(config).expect("context should build");
        context.ingest(&missing)
    })
    .await;

    assert!(matches!(
        result,
        Err(RagError::Collaborator {
            collaborator: Collaborator::TextSource,
            ..
        })
    ));
}
