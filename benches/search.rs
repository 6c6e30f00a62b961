use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use docs_rag::store::{Metadata, SimpleVectorStore};
use std::hint::black_box;
use tempfile::TempDir;

const DIMENSION: usize = 384;

fn vector(seed: usize) -> Vec<f32> {
    (0..DIMENSION)
        .map(|i| ((seed * 31 + i) as f32 * 0.017).sin())
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut group = c.benchmark_group("brute_force_search");

    for records in [1_000, 10_000] {
        let mut store =
            SimpleVectorStore::open(&temp_dir.path().join(records.to_string())).expect("can open store");
        store
            .add(
                (0..records).map(vector).collect(),
                (0..records)
                    .map(|i| Metadata::new(format!("chunk {}", i), "bench"))
                    .collect(),
            )
            .expect("can add records");
        let query = vector(records + 1);

        group.bench_with_input(BenchmarkId::from_parameter(records), &store, |b, store| {
            b.iter(|| store.search(black_box(&query), black_box(5)))
        });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
