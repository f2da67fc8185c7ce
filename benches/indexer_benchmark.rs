use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sgindex::analysis::analyzer::{Analyzer, AnalyzerRegistry};
use sgindex::core::config::IndexerConfig;
use sgindex::core::types::{Document, FieldValue};
use sgindex::encoding::field::encode_value;
use sgindex::indexer::{Indexer, NearRealTimeIndexer};
use sgindex::query::compiler::QueryCompiler;
use sgindex::schema::options::Options;
use sgindex::search::executor::QueryExecutor;
use std::sync::Arc;
use rand::Rng;
use tempfile::TempDir;

const OPTIONS: &str = r#"{"fields": {"content": {"type": "text"}, "rank": {"type": "int"}}}"#;

fn options() -> Options {
    Options::from_json("search", OPTIONS, &AnalyzerRegistry::new()).unwrap()
}

/// Helper to create test documents
fn create_test_document(options: &Options, id: u64, ts: u64, content_size: usize) -> Document {
    let mut rng = rand::thread_rng();
    let content: String = (0..content_size)
        .map(|_| {
            let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];
            words[rng.gen_range(0..words.len())]
        })
        .collect::<Vec<_>>()
        .join(" ");

    let key = format!("doc{}", id);
    let mut doc = Document::new(key.as_str(), key.as_str(), ts);
    let content_props = options.field("content").unwrap();
    doc.add_field(encode_value("content", content_props, FieldValue::Text(content)));
    let rank_props = options.field("rank").unwrap();
    doc.add_field(encode_value("rank", rank_props, FieldValue::Long(rng.gen_range(0..100))));
    doc
}

fn open_indexer(dir: &TempDir) -> NearRealTimeIndexer {
    let config = IndexerConfig {
        refresh_interval_ms: 0,
        background_merge: false,
        ..IndexerConfig::with_base_dir(dir.path())
    };
    NearRealTimeIndexer::open(dir.path().join("idx"), config, Arc::new(Analyzer::standard())).unwrap()
}

/// Benchmark single document upserts into the buffer
fn bench_single_upsert(c: &mut Criterion) {
    let options = options();
    let dir = TempDir::new().unwrap();
    let indexer = open_indexer(&dir);

    c.bench_function("single_document_upsert", |b| {
        let mut id = 0;
        b.iter(|| {
            indexer.upsert(create_test_document(&options, id % 10_000, id, 100)).unwrap();
            id += 1;
        });
    });
}

/// Benchmark upsert batches followed by a commit
fn bench_batch_commit(c: &mut Criterion) {
    let options = options();
    let mut group = c.benchmark_group("batch_commit");

    for batch_size in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let dir = TempDir::new().unwrap();
                let indexer = open_indexer(&dir);
                let mut ts = 0;
                b.iter(|| {
                    for i in 0..batch_size {
                        ts += 1;
                        indexer.upsert(create_test_document(&options, i as u64, ts, 50)).unwrap();
                    }
                    indexer.commit().unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark compiled searches over a committed index
fn bench_search(c: &mut Criterion) {
    let options = options();
    let dir = TempDir::new().unwrap();
    let indexer = open_indexer(&dir);
    for i in 0..10_000 {
        indexer.upsert(create_test_document(&options, i, 1, 50)).unwrap();
        if i % 1_000 == 999 {
            indexer.commit().unwrap();
        }
    }
    indexer.commit().unwrap();

    let compiler = QueryCompiler::new(&options);
    let queries = [
        ("term", r#"{"query": {"type": "match", "field": "content", "value": "fox"}}"#),
        ("phrase", r#"{"query": {"type": "phrase", "field": "content", "value": "quick brown"}}"#),
        ("range", r#"{"query": {"type": "range", "field": "rank", "lower": 10, "upper": 20}}"#),
        ("sorted", r#"{"query": {"type": "match_all"}, "sort": {"fields": [{"field": "rank"}]}}"#),
    ];

    let mut group = c.benchmark_group("search");
    for (name, json) in queries {
        let compiled = compiler.compile_json(json).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| {
                let searcher = indexer.acquire_searcher().unwrap();
                let executor = QueryExecutor::new(searcher.snapshot());
                black_box(executor.search(&compiled, 100).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_upsert, bench_batch_commit, bench_search);
criterion_main!(benches);
