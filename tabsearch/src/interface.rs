//! tabsearch FFI Interface Definition
//!
//! Records, enums and the error type shared with foreign callers via UniFFI.

use crate::language::Language;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Enumeration order for stored records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, uniffi::Enum)]
pub enum Direction {
    /// Oldest first
    #[default]
    Next,
    /// Newest first
    Prev,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// A document as submitted by a collector (page, frame, PDF, history entry).
///
/// Empty strings mean "absent". `date` defaults to today (UTC) and `lang`
/// to English when unrecognized.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, uniffi::Record)]
pub struct DocumentInput {
    /// Caller-chosen identifier; the store assigns one when `None`.
    pub guid: Option<String>,
    pub lang: String,
    pub url: String,
    pub title: String,
    pub body: String,
    /// Comma separated, whitespace around commas is ignored.
    pub keywords: String,
    pub description: String,
    pub mime: String,
    /// `YYYYMMDD`
    pub date: Option<String>,
}

/// Caller-attached fields that are stored but never indexed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, uniffi::Record)]
#[serde(default)]
pub struct HiddenMeta {
    pub tab_id: Option<i64>,
    pub window_id: Option<i64>,
    pub frame_id: Option<i64>,
    pub top: bool,
    pub fav_icon_url: Option<String>,
    /// Unix milliseconds; filled with the insertion time when absent.
    pub timestamp: Option<i64>,
    pub pinned: bool,
    pub visit_count: Option<u32>,
    pub last_visit_time: Option<i64>,
    pub typed_count: Option<u32>,
    pub is_history: bool,
}

/// A document as returned from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct StoredDocument {
    pub guid: String,
    pub language: Language,
    pub url: String,
    pub hostname: String,
    pub filename: String,
    pub title: String,
    pub body: String,
    pub keywords: String,
    pub description: String,
    pub mime: String,
    pub date: String,
    pub hidden: HiddenMeta,
}

/// Parameters of a ranked query.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SearchRequest {
    pub query: String,
    pub language_tag: String,
    pub start: u32,
    pub length: u32,
    pub partial: bool,
    pub spell_correction: bool,
    pub synonyms: bool,
    pub descending: bool,
}

impl SearchRequest {
    /// A request with the stock options: first page of 30, partial terms on,
    /// best match first.
    pub fn new(query: impl Into<String>, language_tag: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language_tag: language_tag.into(),
            start: 0,
            length: 30,
            partial: true,
            spell_correction: false,
            synonyms: false,
            descending: true,
        }
    }
}

/// Outcome of a query; the hits themselves are read through the per-rank accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, uniffi::Record)]
pub struct SearchSummary {
    /// Hits materialized in the current page.
    pub size: u32,
    /// Total number of matching documents.
    pub estimated_total: u64,
    /// Whether the last token had to be widened to find anything.
    pub widened: bool,
}

/// One ranked hit of the active result set.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SearchHit {
    pub rank: u32,
    pub guid: String,
    pub percent: u32,
}

/// A paragraph-level hit inside one document.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct DeepSearchHit {
    pub rank: u32,
    pub percent: u32,
    pub snippet: String,
}

/// Result of a batch insertion.
#[derive(Debug, Clone, PartialEq, Eq, Default, uniffi::Record)]
pub struct BatchOutcome {
    pub guids: Vec<String>,
    /// Documents skipped because they could not be stored or indexed.
    pub ignored: u32,
}

/// A document with its hidden metadata, as produced for one source.
#[derive(Debug, Clone, PartialEq, Eq, Default, uniffi::Record)]
pub struct SourceDocument {
    pub record: DocumentInput,
    pub hidden: HiddenMeta,
}

/// Everything a collector gathered for one tab or history entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, uniffi::Record)]
pub struct SourceSnapshot {
    pub source_id: String,
    pub url: String,
    /// Set by the collector for duplicates and user exceptions.
    pub skip: bool,
    pub documents: Vec<SourceDocument>,
}

/// Counters of one indexing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, uniffi::Record)]
pub struct IndexingReport {
    /// Documents now indexed for the sources of this pass.
    pub docs: u32,
    /// Sources skipped plus documents that failed to index.
    pub ignored: u32,
    /// Documents removed because their source changed or disappeared.
    pub removed: u32,
}

/// Size of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, uniffi::Record)]
pub struct PartitionStats {
    pub documents: u64,
    pub terms: u64,
    /// Operations not yet committed to durable storage.
    pub pending: u64,
}

/// Error type for tabsearch operations
#[derive(Debug, Error, uniffi::Error)]
pub enum SearchError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    QueryError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Partition error: {0}")]
    PartitionError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<crate::database::DatabaseError> for SearchError {
    fn from(e: crate::database::DatabaseError) -> Self {
        match e {
            crate::database::DatabaseError::NotFound(guid) => SearchError::NotFound(guid),
            other => SearchError::StorageError(other.to_string()),
        }
    }
}

impl From<crate::indexer::IndexerError> for SearchError {
    fn from(e: crate::indexer::IndexerError) -> Self {
        use crate::indexer::IndexerError;
        match e {
            IndexerError::NotPrepared(_) => SearchError::PartitionError(e.to_string()),
            IndexerError::NoResults | IndexerError::RankOutOfRange { .. } => SearchError::NotFound(e.to_string()),
            IndexerError::Query(q) => SearchError::QueryError(q.to_string()),
            IndexerError::Io(_) | IndexerError::Journal(_) => SearchError::StorageError(e.to_string()),
        }
    }
}

impl From<crate::query::QueryError> for SearchError {
    fn from(e: crate::query::QueryError) -> Self {
        SearchError::QueryError(e.to_string())
    }
}

impl From<crate::config::ConfigError> for SearchError {
    fn from(e: crate::config::ConfigError) -> Self {
        SearchError::InvalidInput(e.to_string())
    }
}

impl From<crate::sources::SourceTableError> for SearchError {
    fn from(e: crate::sources::SourceTableError) -> Self {
        SearchError::StorageError(e.to_string())
    }
}
