//! tabsearch - full-text indexing and retrieval for browser tabs
//!
//! Documents (page bodies, titles, keywords, PDF text) are analyzed per
//! language, posted into partitioned inverted indexes and served back as
//! ranked hits with highlighted snippets.
//!
//! Types are exported via UniFFI proc-macros (#[derive(uniffi::Record/Enum)]).

pub(crate) mod candidate;
pub mod config;
pub mod content_detection;
pub mod database;
pub(crate) mod dictionary;
pub mod indexer;
pub mod interface;
pub mod journal;
pub mod language;
pub mod models;
pub mod query;
pub mod ranking;
pub mod search;
pub mod sources;
mod store;

pub use config::EngineConfig;
pub use interface::*;
pub use language::Language;
pub use store::{open_engine, SearchEngine};

uniffi::setup_scaffolding!("tabsearch");
