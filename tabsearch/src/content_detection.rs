//! Field derivation and normalization for incoming documents
//!
//! Hostname and path extraction, keyword list cleanup, date stamps and
//! paragraph chunking for deep search.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Separator between keywords: a comma with any surrounding whitespace
static KEYWORD_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").unwrap());

/// Runs of newlines delimit paragraphs
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

/// `YYYYMMDD`
static DATE_STAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8}$").unwrap());

/// Schemes a collector may hand to the indexer. Browser-internal pages
/// (about:, chrome:, moz-extension:) are never indexed.
const INDEXABLE_PROTOCOLS: &[&str] = &["http://", "https://", "ftp://", "file://"];

/// Hostname and path of a URL; empty strings for unparseable input.
pub fn url_parts(url: &str) -> (String, String) {
    match Url::parse(url.trim()) {
        Ok(parsed) => {
            let hostname = parsed.host_str().unwrap_or_default().to_string();
            (hostname, parsed.path().to_string())
        }
        Err(_) => (String::new(), String::new()),
    }
}

pub fn is_indexable_url(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    INDEXABLE_PROTOCOLS.iter().any(|p| lower.starts_with(p)) && Url::parse(url.trim()).is_ok()
}

/// Split a keyword list on commas and re-join it without padding.
/// Empty entries are dropped.
pub fn normalize_keywords(raw: &str) -> String {
    KEYWORD_SEPARATOR
        .split(raw.trim())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Today's UTC date as `YYYYMMDD`
pub fn today_stamp() -> String {
    Utc::now().format("%Y%m%d").to_string()
}

pub fn is_date_stamp(value: &str) -> bool {
    DATE_STAMP.is_match(value)
}

/// Truncate `body` to at most `max_bytes`, backing off to a char boundary.
pub fn truncate_body(body: &str, max_bytes: usize) -> &str {
    if body.len() <= max_bytes {
        return body;
    }
    let mut end = max_bytes;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Chunk a body into paragraphs for deep search. Consecutive paragraphs are
/// merged until a chunk is longer than `min_chars`; the remainder forms the
/// last chunk.
pub fn split_paragraphs(body: &str, min_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for paragraph in PARAGRAPH_BREAK.split(body) {
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(paragraph);
        if current.chars().count() > min_chars {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}
