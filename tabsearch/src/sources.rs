//! Source table: which guids each tab or history entry produced.
//!
//! An indexing pass walks the current sources. A source whose URL is
//! unchanged keeps its documents; a changed (or cleanup-marked) one has its
//! old guids removed before the new ones are added; sources not seen during
//! the pass are orphaned and their guids dropped when the pass finishes.

use crate::models::Guid;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceTableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source table encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SourceTableResult<T> = Result<T, SourceTableError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedSource {
    pub url: String,
    pub guids: Vec<Guid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTable {
    entries: HashMap<String, IndexedSource>,
    /// Source ids whose documents must be rebuilt on the next pass even when
    /// the URL did not change.
    #[serde(default)]
    cleanup: HashSet<String>,
}

/// What a pass must do with one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    /// Indexed under the same URL: nothing to do.
    Unchanged { guids: Vec<Guid> },
    /// Indexed before, but stale: remove these guids, then index again.
    Changed { stale: Vec<Guid> },
    New,
}

impl SourceTable {
    /// Load from `path`; a missing file is an empty table.
    pub fn load(path: &Path) -> SourceTableResult<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> SourceTableResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, source_id: &str) -> Option<&IndexedSource> {
        self.entries.get(source_id)
    }

    /// Force the next pass to rebuild these sources.
    pub fn mark_for_reindex<I, S>(&mut self, source_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cleanup.extend(source_ids.into_iter().map(Into::into));
    }

    /// Forget every source, e.g. after the partition was reset.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.cleanup.clear();
    }

    /// Start a pass. The table is consumed; `IndexingPass::finish` returns
    /// the table for the next pass.
    pub fn begin_pass(self) -> IndexingPass {
        IndexingPass {
            previous: self.entries,
            cleanup: self.cleanup,
            current: HashMap::new(),
            retry: HashSet::new(),
        }
    }
}

/// Bookkeeping of one pass in progress.
#[derive(Debug)]
pub struct IndexingPass {
    previous: HashMap<String, IndexedSource>,
    cleanup: HashSet<String>,
    current: HashMap<String, IndexedSource>,
    /// Sources whose stale documents could not all be removed.
    retry: HashSet<String>,
}

impl IndexingPass {
    /// Classify a source. Unchanged sources are carried into the new table
    /// immediately; for the others the caller indexes and then `record`s.
    pub fn check(&mut self, source_id: &str, url: &str) -> SourceStatus {
        let Some(previous) = self.previous.remove(source_id) else {
            return SourceStatus::New;
        };
        if previous.url == url && !self.cleanup.contains(source_id) {
            let guids = previous.guids.clone();
            self.current.insert(source_id.to_string(), previous);
            return SourceStatus::Unchanged { guids };
        }
        SourceStatus::Changed { stale: previous.guids }
    }

    /// Record the guids freshly indexed for a source. Sources that produced
    /// no documents are left out so the next pass retries them.
    pub fn record(&mut self, source_id: &str, url: &str, guids: Vec<Guid>) {
        if guids.is_empty() {
            return;
        }
        self.current.insert(
            source_id.to_string(),
            IndexedSource { url: url.to_string(), guids },
        );
    }

    /// Keep tracking a changed source whose stale guids could not be
    /// removed; the next pass rebuilds it.
    pub fn retry(&mut self, source_id: &str, url: &str, stale: Vec<Guid>) {
        self.retry.insert(source_id.to_string());
        self.current.insert(
            source_id.to_string(),
            IndexedSource { url: url.to_string(), guids: stale },
        );
    }

    /// Guids of the sources not seen so far.
    pub fn orphaned(&self) -> Vec<Guid> {
        self.previous.values().flat_map(|s| s.guids.iter().cloned()).collect()
    }

    /// Close the pass: the new table and the guids of sources not seen.
    pub fn finish(self) -> (SourceTable, Vec<Guid>) {
        let orphaned = self.orphaned();
        let table = SourceTable {
            entries: self.current,
            cleanup: self.retry,
        };
        (table, orphaned)
    }

    /// Close a pass that stopped early. Sources not reached keep their old
    /// entries (and cleanup marks) so nothing indexed goes untracked.
    pub fn interrupt(self) -> SourceTable {
        let mut cleanup = self.retry;
        cleanup.extend(self.cleanup.into_iter().filter(|id| self.previous.contains_key(id)));
        let mut entries = self.previous;
        entries.extend(self.current);
        SourceTable { entries, cleanup }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guids(values: &[&str]) -> Vec<Guid> {
        values.iter().map(|v| Guid::new(*v)).collect()
    }

    fn table_with(entries: &[(&str, &str, &[&str])]) -> SourceTable {
        let mut pass = SourceTable::default().begin_pass();
        for (id, url, g) in entries {
            assert_eq!(pass.check(id, url), SourceStatus::New);
            pass.record(id, url, guids(g));
        }
        pass.finish().0
    }

    #[test]
    fn test_unchanged_source_is_kept() {
        let table = table_with(&[("tab-1", "https://a.example/", &["1", "2"])]);
        let mut pass = table.begin_pass();
        assert_eq!(
            pass.check("tab-1", "https://a.example/"),
            SourceStatus::Unchanged { guids: guids(&["1", "2"]) }
        );
        let (table, orphaned) = pass.finish();
        assert!(orphaned.is_empty());
        assert_eq!(table.get("tab-1").unwrap().guids, guids(&["1", "2"]));
    }

    #[test]
    fn test_changed_url_replaces_guids() {
        let table = table_with(&[("tab-1", "https://a.example/", &["1"])]);
        let mut pass = table.begin_pass();
        assert_eq!(
            pass.check("tab-1", "https://b.example/"),
            SourceStatus::Changed { stale: guids(&["1"]) }
        );
        pass.record("tab-1", "https://b.example/", guids(&["7"]));
        let (table, orphaned) = pass.finish();
        assert!(orphaned.is_empty());
        let source = table.get("tab-1").unwrap();
        assert_eq!(source.url, "https://b.example/");
        assert_eq!(source.guids, guids(&["7"]));
    }

    #[test]
    fn test_vanished_sources_are_orphaned() {
        let table = table_with(&[
            ("tab-1", "https://a.example/", &["1"]),
            ("tab-2", "https://b.example/", &["2", "3"]),
        ]);
        let mut pass = table.begin_pass();
        pass.check("tab-1", "https://a.example/");
        let (table, mut orphaned) = pass.finish();
        orphaned.sort();
        assert_eq!(orphaned, guids(&["2", "3"]));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_cleanup_forces_reindex_once() {
        let mut table = table_with(&[("tab-1", "https://a.example/", &["1"])]);
        table.mark_for_reindex(["tab-1"]);
        let mut pass = table.begin_pass();
        assert_eq!(
            pass.check("tab-1", "https://a.example/"),
            SourceStatus::Changed { stale: guids(&["1"]) }
        );
        pass.record("tab-1", "https://a.example/", guids(&["2"]));
        let (table, _) = pass.finish();

        let mut pass = table.begin_pass();
        assert!(matches!(pass.check("tab-1", "https://a.example/"), SourceStatus::Unchanged { .. }));
    }

    #[test]
    fn test_interrupted_pass_keeps_every_source_tracked() {
        let mut table = table_with(&[
            ("tab-1", "https://a.example/", &["1"]),
            ("tab-2", "https://b.example/", &["2"]),
            ("tab-3", "https://c.example/", &["3"]),
        ]);
        table.mark_for_reindex(["tab-3"]);
        let mut pass = table.begin_pass();
        assert_eq!(pass.check("tab-4", "https://d.example/"), SourceStatus::New);
        pass.record("tab-4", "https://d.example/", guids(&["4"]));
        assert_eq!(
            pass.check("tab-2", "https://b.example/next"),
            SourceStatus::Changed { stale: guids(&["2"]) }
        );
        pass.retry("tab-2", "https://b.example/next", guids(&["2"]));

        let mut orphaned = pass.orphaned();
        orphaned.sort();
        assert_eq!(orphaned, guids(&["1", "3"]));

        let table = pass.interrupt();
        assert_eq!(table.len(), 4);
        assert_eq!(table.get("tab-4").unwrap().guids, guids(&["4"]));
        assert_eq!(table.get("tab-1").unwrap().guids, guids(&["1"]));

        let mut pass = table.begin_pass();
        assert!(matches!(pass.check("tab-1", "https://a.example/"), SourceStatus::Unchanged { .. }));
        assert!(matches!(pass.check("tab-4", "https://d.example/"), SourceStatus::Unchanged { .. }));
        assert_eq!(
            pass.check("tab-2", "https://b.example/next"),
            SourceStatus::Changed { stale: guids(&["2"]) }
        );
        assert!(matches!(pass.check("tab-3", "https://c.example/"), SourceStatus::Changed { .. }));
    }

    #[test]
    fn test_empty_sources_are_not_recorded() {
        let mut pass = SourceTable::default().begin_pass();
        pass.check("tab-1", "https://a.example/");
        pass.record("tab-1", "https://a.example/", Vec::new());
        let (table, _) = pass.finish();
        assert!(table.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("sources.json");
        assert!(SourceTable::load(&path).unwrap().is_empty());

        let mut table = table_with(&[("history_9", "https://h.example/", &["4"])]);
        table.mark_for_reindex(["history_9"]);
        table.save(&path).unwrap();

        let loaded = SourceTable::load(&path).unwrap();
        assert_eq!(loaded, table);
    }
}
