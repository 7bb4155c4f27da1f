use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use serde_json::json;
use tempfile::TempDir;

use strix::core::types::WriteMode;
use strix::schema::schema::{FieldDefinition, FieldType};
use strix::{Collection, CollectionManager, Config, SearchParams};

const WORDS: &[&str] = &[
    "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "state", "trooper", "train",
    "down", "there", "fire", "ring", "gone", "river", "mountain", "shadow", "light",
];

fn random_title(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
        .collect::<Vec<_>>()
        .join(" ")
}

fn seeded_collection(dir: &TempDir, num_docs: usize) -> (CollectionManager, std::sync::Arc<Collection>) {
    let config = Config {
        data_path: dir.path().to_path_buf(),
        ..Config::default()
    };
    let manager = CollectionManager::new(config).unwrap();
    manager.load().unwrap();

    let coll = manager
        .create_collection(
            "bench",
            vec![
                FieldDefinition::new("title", FieldType::String),
                FieldDefinition::new("genre", FieldType::String).faceted(),
                FieldDefinition::new("points", FieldType::Int32),
            ],
            "points",
        )
        .unwrap();

    let mut rng = rand::thread_rng();
    let docs: Vec<_> = (0..num_docs)
        .map(|i| {
            json!({
                "id": i.to_string(),
                "title": random_title(&mut rng, 8),
                "genre": format!("genre_{}", i % 12),
                "points": rng.gen_range(0..1000),
            })
        })
        .collect();
    coll.add_many(docs, WriteMode::Create).unwrap();

    (manager, coll)
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    group.sample_size(10);

    for num_docs in [1_000usize, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(num_docs), &num_docs, |b, &n| {
            b.iter(|| {
                let dir = TempDir::new().unwrap();
                let (_manager, coll) = seeded_collection(&dir, n);
                black_box(coll.num_documents());
            });
        });
    }
    group.finish();
}

fn bench_fuzzy_search(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let (_manager, coll) = seeded_collection(&dir, 10_000);

    // rotate misspellings so the result cache stays cold
    let typo_queries: Vec<String> = WORDS
        .iter()
        .map(|w| {
            let mut q = w.to_string();
            q.push('r');
            q
        })
        .collect();

    c.bench_function("fuzzy_single_token", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let q = &typo_queries[i % typo_queries.len()];
            i += 1;
            let mut params = SearchParams::new(q, &["title"]);
            params.num_typos = 2;
            black_box(coll.search(params).unwrap());
        });
    });

    c.bench_function("two_token_query_with_facets", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let q = format!("{} fox", WORDS[i % WORDS.len()]);
            i += 1;
            let params = SearchParams::new(&q, &["title"]).with_facets(&["genre"]);
            black_box(coll.search(params).unwrap());
        });
    });

    c.bench_function("filtered_wildcard", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let params = SearchParams::new("*", &["title"])
                .with_filter(&format!("points:>={}", i % 1000))
                .with_sort(&["points:DESC"]);
            i += 1;
            black_box(coll.search(params).unwrap());
        });
    });
}

criterion_group!(benches, bench_index_build, bench_fuzzy_search);
criterion_main!(benches);
