//! End-to-end behavior of the public engine API: round-trips, ordering,
//! widening, snippet bounds, partition isolation and persistence.

use tabsearch::search::{visible_text, ELLIPSIS, HIGHLIGHT_OPEN};
use tabsearch::{
    DocumentInput, EngineConfig, HiddenMeta, IndexingReport, Language, SearchEngine, SearchError, SearchRequest,
    SourceDocument, SourceSnapshot,
};

fn engine() -> SearchEngine {
    SearchEngine::new_in_memory().unwrap()
}

fn doc(lang: &str, url: &str, title: &str, body: &str) -> DocumentInput {
    DocumentInput {
        lang: lang.to_string(),
        url: url.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        ..Default::default()
    }
}

fn add(engine: &SearchEngine, input: DocumentInput) -> String {
    engine.add_document(input, HiddenMeta::default()).unwrap()
}

fn search(engine: &SearchEngine, query: &str) -> u32 {
    engine.search(SearchRequest::new(query, "en")).unwrap().size
}

#[test]
fn test_rust_guide_scenario() {
    let engine = engine();
    add(&engine, doc("english", "", "Rust Guide", "ownership and borrowing in rust"));

    let summary = engine.search(SearchRequest::new("ownership", "english")).unwrap();
    assert_eq!(summary.size, 1);
    assert!(engine.percent_at(0).unwrap() > 0);
    assert!(engine.snippet_at(0, 300).unwrap().contains("<b>ownership</b>"));
}

#[test]
fn test_roundtrip_returns_stored_fields() {
    let engine = engine();
    let mut input = doc("en", "https://doc.rust-lang.org/book/", "The Book", "zyxwvut marks this page");
    input.keywords = "rust,book".to_string();
    input.description = "Official guide".to_string();
    input.date = Some("20240115".to_string());
    let hidden = HiddenMeta { tab_id: Some(12), window_id: Some(3), pinned: true, ..Default::default() };
    let guid = engine.add_document(input.clone(), hidden).unwrap();

    assert_eq!(search(&engine, "zyxwvut"), 1);
    assert_eq!(engine.guid_at(0).unwrap(), guid);

    let stored = engine.document_at(0).unwrap();
    assert_eq!(stored.guid, guid);
    assert_eq!(stored.url, input.url);
    assert_eq!(stored.title, input.title);
    assert_eq!(stored.body, input.body);
    assert_eq!(stored.keywords, "rust,book");
    assert_eq!(stored.description, "Official guide");
    assert_eq!(stored.date, "20240115");
    assert_eq!(stored.language, Language::English);
    assert_eq!(stored.hidden.tab_id, Some(12));
    assert_eq!(stored.hidden.window_id, Some(3));
    assert!(stored.hidden.pinned);
}

#[test]
fn test_removal_is_idempotent() {
    let engine = engine();
    let guid = add(&engine, doc("en", "https://a.example/", "Alpha", "quixotic content"));
    assert_eq!(search(&engine, "quixotic"), 1);

    engine.remove_documents(vec![guid.clone()]).unwrap();
    engine.remove_documents(vec![guid.clone()]).unwrap();

    assert_eq!(search(&engine, "quixotic"), 0);
    assert!(matches!(engine.document(guid), Err(SearchError::NotFound(_))));
}

#[test]
fn test_equal_scores_keep_insertion_order() {
    let engine = engine();
    let first = add(&engine, doc("en", "", "Twin", "identical twin document"));
    let second = add(&engine, doc("en", "", "Twin", "identical twin document"));

    assert_eq!(search(&engine, "identical"), 2);
    assert_eq!(engine.percent_at(0).unwrap(), engine.percent_at(1).unwrap());
    assert_eq!(engine.guid_at(0).unwrap(), first);
    assert_eq!(engine.guid_at(1).unwrap(), second);

    let ascending = SearchRequest { descending: false, ..SearchRequest::new("identical", "en") };
    engine.search(ascending).unwrap();
    assert_eq!(engine.guid_at(0).unwrap(), first);
}

#[test]
fn test_misspelled_last_token_is_widened() {
    let engine = engine();
    let body = "A gentle introduction to programming in Rust";
    add(&engine, doc("en", "", "Intro", body));

    let summary = engine.search(SearchRequest::new("progamming", "en")).unwrap();
    assert!(summary.widened);
    assert!(summary.size >= 1);

    let snippet = engine.snippet_at(0, 300).unwrap();
    assert!(snippet.contains("<b>programming</b>"));
    assert_eq!(visible_text(&snippet), body);
}

#[test]
fn test_exact_match_is_not_widened() {
    let engine = engine();
    add(&engine, doc("en", "", "Intro", "programming in Rust"));

    let summary = engine.search(SearchRequest::new("programming", "en")).unwrap();
    assert!(!summary.widened);
    assert_eq!(summary.size, 1);
}

#[test]
fn test_snippet_is_bounded_and_keeps_words_whole() {
    let engine = engine();
    let filler = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod tempor";
    let body = format!("{filler} {filler} see docs.rs/borrowing rules apply here {filler} {filler}");
    add(&engine, doc("en", "", "Long", &body));
    search(&engine, "borrowing");

    let body_words: Vec<&str> = body.split_whitespace().collect();
    for max in [20usize, 40, 80] {
        let snippet = engine.snippet_at(0, max as u32).unwrap();
        let visible = visible_text(&snippet);
        assert!(visible.chars().count() <= max, "{max}: {visible:?}");
        assert!(snippet.contains("<b>borrowing</b>"), "{max}: {snippet}");
        for word in visible.trim_matches(ELLIPSIS).split_whitespace() {
            assert!(body_words.contains(&word), "{max}: split word {word:?}");
        }
    }
}

#[test]
fn test_partition_isolation() {
    let engine = engine();
    let batch: Vec<SourceDocument> = (0..1000)
        .map(|i| SourceDocument {
            record: doc("en", &format!("https://example.com/{i}"), &format!("Page {i}"), "shared corpus text"),
            hidden: HiddenMeta::default(),
        })
        .collect();
    let outcome = engine.add_documents(batch).unwrap();
    assert_eq!(outcome.guids.len(), 1000);
    assert_eq!(outcome.ignored, 0);

    let scratch = engine.new_scratch_partition("isolated".into()).unwrap();
    assert_eq!(scratch, 1);
    let summary = engine.search_partition(scratch, SearchRequest::new("shared", "en")).unwrap();
    assert_eq!(summary.size, 0);
    assert_eq!(summary.estimated_total, 0);

    let primary = engine.search(SearchRequest::new("shared", "en")).unwrap();
    assert_eq!(primary.size, 30);
    assert_eq!(primary.estimated_total, 1000);
    engine.release_scratch_partition(scratch).unwrap();
}

#[test]
fn test_unknown_language_falls_back_to_english() {
    let engine = engine();
    let guid = add(&engine, doc("tlh-KL", "", "Fallback", "walking through gardens"));

    assert_eq!(engine.document(guid).unwrap().language, Language::English);
    let summary = engine.search(SearchRequest::new("walked", "xx")).unwrap();
    assert_eq!(summary.size, 1);
}

#[test]
fn test_phrase_field_and_exclusion_queries() {
    let engine = engine();
    let a = add(&engine, doc("en", "", "Rust Guide", "memory safety without garbage collection"));
    let b = add(&engine, doc("en", "", "Notes", "safety of memory and a guide to tooling"));

    assert_eq!(search(&engine, "\"memory safety\""), 1);
    assert_eq!(engine.guid_at(0).unwrap(), a);

    assert_eq!(search(&engine, "title:guide"), 1);
    assert_eq!(engine.guid_at(0).unwrap(), a);

    assert_eq!(search(&engine, "memory -garbage"), 1);
    assert_eq!(engine.guid_at(0).unwrap(), b);

    match engine.search(SearchRequest::new("colour:red", "en")) {
        Err(SearchError::QueryError(message)) => assert!(message.contains("colour")),
        other => panic!("expected a query error, got {other:?}"),
    }
}

#[test]
fn test_committed_documents_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let guid = {
        let engine = SearchEngine::new(EngineConfig::in_dir(dir.path())).unwrap();
        let guid = add(&engine, doc("en", "https://a.example/", "Saved", "persistent marmalade"));
        engine.commit().unwrap();
        guid
    };

    let engine = SearchEngine::new(EngineConfig::in_dir(dir.path())).unwrap();
    assert_eq!(engine.count().unwrap(), 1);
    assert_eq!(search(&engine, "marmalade"), 1);
    assert_eq!(engine.guid_at(0).unwrap(), guid);
    assert_eq!(engine.stats(0).unwrap().pending, 0);
}

#[test]
fn test_indexing_passes_track_sources() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = |id: &str, url: &str, body: &str| SourceSnapshot {
        source_id: id.to_string(),
        url: url.to_string(),
        skip: false,
        documents: vec![SourceDocument { record: doc("en", url, "Tab", body), hidden: HiddenMeta::default() }],
    };

    {
        let engine = SearchEngine::new(EngineConfig::in_dir(dir.path())).unwrap();
        let report = engine
            .run_indexing_pass(vec![
                snapshot("1", "https://a.example/", "apricot"),
                snapshot("2", "https://b.example/", "blueberry"),
                snapshot("3", "about:blank", "ignored"),
            ])
            .unwrap();
        assert_eq!(report, IndexingReport { docs: 2, ignored: 1, removed: 0 });
    }

    let engine = SearchEngine::new(EngineConfig::in_dir(dir.path())).unwrap();
    let report = engine
        .run_indexing_pass(vec![
            snapshot("1", "https://a.example/", "apricot"),
            snapshot("2", "https://b.example/next", "cranberry"),
        ])
        .unwrap();
    assert_eq!(report, IndexingReport { docs: 2, ignored: 0, removed: 1 });
    assert_eq!(search(&engine, "blueberry"), 0);
    assert_eq!(search(&engine, "cranberry"), 1);
    assert_eq!(search(&engine, "apricot"), 1);
}

#[test]
fn test_deep_search_ranks_paragraphs_and_frees_scratch() {
    let config = EngineConfig { snippet_size: 30, ..Default::default() };
    let engine = SearchEngine::new(config).unwrap();
    let body = "Installing the toolchain with rustup takes a minute.\n\n\
                Traits describe shared behavior, and traits can have default methods.\n\n\
                Generic functions are often bounded by traits.";
    let guid = add(&engine, doc("en", "", "Book", body));

    let hits = engine.deep_search(guid, "traits".into(), String::new()).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].percent >= hits[1].percent);
    assert!(hits.iter().any(|h| h.snippet.starts_with("<b>Traits</b>")));
    assert!(hits.iter().all(|h| h.snippet.contains(HIGHLIGHT_OPEN)));

    // The scratch partition used by deep search is gone again.
    assert_eq!(engine.new_scratch_partition("after".into()).unwrap(), 1);
}
