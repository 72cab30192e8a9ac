//! Generate a synthetic tab corpus for performance testing.
//!
//! Writes a document store and a committed, compacted index through the
//! regular engine, so the layout matches what the library produces.
//!
//! Usage:
//!     cargo run --release --bin generate-corpus [output_dir] [documents]
//!
//! Default output: ./corpus with 2000 documents

use rand::Rng;
use std::env;
use std::path::PathBuf;
use tabsearch::{DocumentInput, EngineConfig, HiddenMeta, SearchEngine, SourceDocument};

const DEFAULT_DOCUMENTS: usize = 2_000;

const BATCH_SIZE: usize = 200;

const HOSTS: &[&str] = &[
    "doc.rust-lang.org",
    "developer.mozilla.org",
    "en.wikipedia.org",
    "news.ycombinator.com",
    "github.com",
    "stackoverflow.com",
];

const LANGUAGES: &[&str] = &["en", "en-US", "en-GB", "de", "fr"];

const LOREM_WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "labore", "dolore", "magna", "aliqua", "enim", "minim",
    "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi", "aliquip",
];

const TOPICS: &[&str] = &[
    "ownership", "borrowing", "lifetimes", "traits", "generics", "closures", "iterators",
    "concurrency", "async", "macros", "testing", "documentation", "performance", "networking",
    "database", "parsing", "serialization", "browser", "extension", "search",
];

fn paragraph(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(30..=120);
    let mut words: Vec<&str> = (0..len)
        .map(|_| LOREM_WORDS[rng.gen_range(0..LOREM_WORDS.len())])
        .collect();
    for _ in 0..rng.gen_range(1..=4) {
        let at = rng.gen_range(0..words.len());
        words.insert(at, TOPICS[rng.gen_range(0..TOPICS.len())]);
    }
    words.join(" ")
}

fn document(rng: &mut impl Rng, i: usize) -> SourceDocument {
    let host = HOSTS[rng.gen_range(0..HOSTS.len())];
    let topic = TOPICS[rng.gen_range(0..TOPICS.len())];
    let body = (0..rng.gen_range(2..=12))
        .map(|_| paragraph(rng))
        .collect::<Vec<_>>()
        .join("\n\n");

    SourceDocument {
        record: DocumentInput {
            lang: LANGUAGES[rng.gen_range(0..LANGUAGES.len())].to_string(),
            url: format!("https://{host}/{topic}/{i}"),
            title: format!("Notes on {topic} #{i}"),
            keywords: format!("{topic}, {}", TOPICS[rng.gen_range(0..TOPICS.len())]),
            body,
            ..Default::default()
        },
        hidden: HiddenMeta {
            tab_id: Some(i as i64),
            window_id: Some(rng.gen_range(1..=4)),
            top: true,
            pinned: rng.gen_bool(0.05),
            ..Default::default()
        },
    }
}

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let output = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("corpus"));
    let count = match args.next() {
        Some(n) => n.parse()?,
        None => DEFAULT_DOCUMENTS,
    };

    println!("Generating synthetic corpus...");
    println!("Output: {}", output.display());

    let engine = SearchEngine::new(EngineConfig::in_dir(&output))?;
    let mut rng = rand::thread_rng();
    let mut written = 0;

    while written < count {
        let n = BATCH_SIZE.min(count - written);
        let batch = (written..written + n).map(|i| document(&mut rng, i)).collect();
        let outcome = engine.add_documents(batch)?;
        written += n;
        if outcome.ignored > 0 {
            println!("  {} document(s) ignored", outcome.ignored);
        }
        println!("  Generated {}/{} documents...", written, count);
    }
    engine.sync()?;

    let stats = engine.stats(0)?;
    println!();
    println!("Corpus created: {}", output.display());
    println!("  Documents: {}", stats.documents);
    println!("  Terms: {}", stats.terms);
    Ok(())
}
