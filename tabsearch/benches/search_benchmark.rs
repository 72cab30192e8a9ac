use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tabsearch::{DocumentInput, HiddenMeta, SearchEngine, SearchRequest, SourceDocument};

const WORDS: &[&str] = &[
    "ownership", "borrowing", "lifetimes", "traits", "generics", "closures", "iterators", "concurrency",
    "programming", "memory", "safety", "compiler", "error", "build", "failed", "dependency", "river",
    "riverside", "hello", "world", "network", "socket", "parser", "token", "stream", "buffer",
];

fn corpus(count: usize) -> Vec<SourceDocument> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| {
            let body = (0..rng.gen_range(50..400))
                .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
                .collect::<Vec<_>>()
                .join(" ");
            SourceDocument {
                record: DocumentInput {
                    lang: "en".to_string(),
                    url: format!("https://example.com/{i}"),
                    title: format!("{} {}", WORDS[i % WORDS.len()], WORDS[(i * 7) % WORDS.len()]),
                    body,
                    ..Default::default()
                },
                hidden: HiddenMeta::default(),
            }
        })
        .collect()
}

fn setup_engine() -> SearchEngine {
    let engine = SearchEngine::new_in_memory().expect("Failed to create engine");
    engine.add_documents(corpus(5_000)).expect("Failed to index corpus");
    engine
}

fn bench_search(c: &mut Criterion) {
    let engine = setup_engine();

    let queries = vec![
        ("short_prefix", "ow"),
        ("medium_word", "hello"),
        ("long_word", "riverside"),
        ("multi_word", "hello world"),
        ("widened_typo", "riversde"),
        ("phrase", "\"memory safety\""),
        ("long_query", "error build failed due to dependency"),
    ];

    let mut group = c.benchmark_group("search");
    group.sample_size(20);

    for (name, query) in queries {
        group.bench_function(name, |b| {
            b.iter(|| engine.search(SearchRequest::new(query, "en")).unwrap());
        });
    }
    group.finish();
}

fn bench_snippet(c: &mut Criterion) {
    let engine = setup_engine();
    engine.search(SearchRequest::new("borrowing lifetimes", "en")).unwrap();

    c.bench_function("snippet_at", |b| {
        b.iter(|| engine.snippet_at(0, 300).unwrap());
    });
}

fn bench_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexing");
    group.sample_size(10);

    group.bench_function("add_documents_500", |b| {
        b.iter_batched(
            || (SearchEngine::new_in_memory().unwrap(), corpus(500)),
            |(engine, batch)| engine.add_documents(batch).unwrap(),
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_search, bench_snippet, bench_indexing);
criterion_main!(benches);
