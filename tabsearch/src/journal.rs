//! Durable form of a directory-backed partition.
//!
//! A partition directory holds `snapshot.json` (the state as of the last
//! compaction) and `journal.jsonl` (one operation per line, appended by each
//! commit). Opening replays the snapshot and then the journal.

use crate::models::{Guid, IndexableDocument};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

const SNAPSHOT_FILE: &str = "snapshot.json";
const JOURNAL_FILE: &str = "journal.jsonl";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("journal corrupt at line {0}")]
    Corrupt(usize),
    #[error("unsupported snapshot version {0}")]
    Version(u32),
}

pub type JournalResult<T> = Result<T, JournalError>;

/// One committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    Add { document: IndexableDocument },
    Remove { guids: Vec<Guid> },
    Clear,
    Synonym { term: String, synonym: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Live documents in insertion order.
    pub documents: Vec<IndexableDocument>,
    pub synonyms: Vec<(String, String)>,
}

impl Snapshot {
    pub fn new(documents: Vec<IndexableDocument>, synonyms: Vec<(String, String)>) -> Self {
        Self { version: SNAPSHOT_VERSION, documents, synonyms }
    }

    /// The snapshot as a sequence of replayable entries.
    fn into_entries(self) -> Vec<JournalEntry> {
        let mut entries: Vec<JournalEntry> = self
            .synonyms
            .into_iter()
            .map(|(term, synonym)| JournalEntry::Synonym { term, synonym })
            .collect();
        entries.extend(self.documents.into_iter().map(|document| JournalEntry::Add { document }));
        entries
    }
}

/// Snapshot plus append-only journal in one directory.
#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
}

impl Journal {
    pub fn open(dir: &Path) -> JournalResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    fn journal_path(&self) -> PathBuf {
        self.dir.join(JOURNAL_FILE)
    }

    /// Everything needed to rebuild the partition, oldest first.
    ///
    /// A torn final journal line (an interrupted append) is ignored; a bad
    /// line anywhere else is corruption.
    pub fn load(&self) -> JournalResult<Vec<JournalEntry>> {
        let mut entries = match fs::read_to_string(self.snapshot_path()) {
            Ok(text) => {
                let snapshot: Snapshot = serde_json::from_str(&text)?;
                if snapshot.version != SNAPSHOT_VERSION {
                    return Err(JournalError::Version(snapshot.version));
                }
                snapshot.into_entries()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let text = match fs::read_to_string(self.journal_path()) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let last = lines.len().saturating_sub(1);
        let mut offset = 0u64;
        for (index, line) in lines.iter().enumerate() {
            let start = offset;
            offset += line.len() as u64;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(_) if index == last => {
                    // Cut the torn line so the next append starts on a fresh line.
                    warn!(dir = %self.dir.display(), bytes = offset - start, "truncating torn journal tail");
                    OpenOptions::new().write(true).open(self.journal_path())?.set_len(start)?;
                }
                Err(_) => return Err(JournalError::Corrupt(index + 1)),
            }
        }
        Ok(entries)
    }

    /// Append and fsync. On failure the journal is cut back to its previous
    /// length so no partial commit remains.
    pub fn append(&self, entries: &[JournalEntry]) -> JournalResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut buffer = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buffer, entry)?;
            buffer.push(b'\n');
        }

        let mut file = OpenOptions::new().create(true).append(true).open(self.journal_path())?;
        let previous_len = file.metadata()?.len();
        let written = file.write_all(&buffer).and_then(|_| file.sync_all());
        if let Err(e) = written {
            if let Err(rollback) = file.set_len(previous_len) {
                warn!(dir = %self.dir.display(), error = %rollback, "failed to cut back journal after a failed append");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Replace the snapshot and empty the journal.
    pub fn rewrite(&self, snapshot: &Snapshot) -> JournalResult<()> {
        let tmp = self.dir.join(format!("{}.tmp", SNAPSHOT_FILE));
        {
            let mut file = File::create(&tmp)?;
            serde_json::to_writer(&mut file, snapshot)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.snapshot_path())?;
        let journal = File::create(self.journal_path())?;
        journal.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::models::Field;

    fn doc(guid: &str, body: &str) -> IndexableDocument {
        IndexableDocument::new(guid, Language::English, vec![(Field::Body, body.to_string())])
    }

    #[test]
    fn test_empty_directory_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn test_append_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        journal.append(&[JournalEntry::Add { document: doc("1", "hello") }]).unwrap();
        journal.append(&[JournalEntry::Remove { guids: vec![Guid::new("1")] }]).unwrap();

        let entries = journal.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[1], JournalEntry::Remove { .. }));
    }

    #[test]
    fn test_rewrite_replaces_journal() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        journal.append(&[JournalEntry::Add { document: doc("1", "a") }]).unwrap();
        journal.append(&[JournalEntry::Add { document: doc("2", "b") }]).unwrap();
        journal.append(&[JournalEntry::Remove { guids: vec![Guid::new("1")] }]).unwrap();

        let snapshot = Snapshot::new(vec![doc("2", "b")], vec![("car".into(), "automobile".into())]);
        journal.rewrite(&snapshot).unwrap();

        let entries = journal.load().unwrap();
        assert_eq!(
            entries,
            vec![
                JournalEntry::Synonym { term: "car".into(), synonym: "automobile".into() },
                JournalEntry::Add { document: doc("2", "b") },
            ]
        );
    }

    #[test]
    fn test_torn_tail_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        journal.append(&[JournalEntry::Clear]).unwrap();
        let mut file = OpenOptions::new().append(true).open(dir.path().join(JOURNAL_FILE)).unwrap();
        file.write_all(b"{\"op\":\"add\",\"docu").unwrap();

        assert_eq!(journal.load().unwrap(), vec![JournalEntry::Clear]);
        assert_eq!(fs::read_to_string(dir.path().join(JOURNAL_FILE)).unwrap(), "{\"op\":\"clear\"}\n");
    }

    #[test]
    fn test_append_after_torn_tail_stays_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        journal.append(&[JournalEntry::Clear]).unwrap();
        let mut file = OpenOptions::new().append(true).open(dir.path().join(JOURNAL_FILE)).unwrap();
        file.write_all(b"{\"op\":\"add\",\"docu").unwrap();
        drop(file);

        assert_eq!(journal.load().unwrap(), vec![JournalEntry::Clear]);
        journal
            .append(&[
                JournalEntry::Add { document: doc("1", "hello") },
                JournalEntry::Remove { guids: vec![Guid::new("1")] },
            ])
            .unwrap();

        let reopened = Journal::open(dir.path()).unwrap();
        let entries = reopened.load().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1], JournalEntry::Add { document: doc("1", "hello") });
    }

    #[test]
    fn test_corrupt_middle_line_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(JOURNAL_FILE), "garbage\n{\"op\":\"clear\"}\n").unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        assert!(matches!(journal.load(), Err(JournalError::Corrupt(1))));
    }
}
