//! Document store: guid → original field values and hidden metadata
//!
//! `SqliteDocumentStore` backs the primary partition on disk, using r2d2
//! connection pooling so readers never wait on a mutex. `MemoryDocumentStore`
//! backs scratch partitions and engines opened without a database path.

use crate::interface::{Direction, HiddenMeta, StoredDocument};
use crate::language::Language;
use crate::models::{DocumentRecord, Guid};
use parking_lot::RwLock;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Hidden metadata encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("document {0} not found")]
    NotFound(String),
    #[error("guid {0} is already in use")]
    DuplicateGuid(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Storage for original document records.
///
/// Every write is all-or-nothing per record. Deletion is idempotent.
pub trait DocumentStore: Send + Sync {
    /// Store a record, assigning a guid when the record carries none.
    fn put(&self, record: &DocumentRecord) -> DatabaseResult<Guid>;

    fn get(&self, guid: &Guid) -> DatabaseResult<StoredDocument>;

    fn delete(&self, guids: &[Guid]) -> DatabaseResult<()>;

    fn count(&self) -> DatabaseResult<u64>;

    /// Page through records ordered by insertion timestamp.
    fn enumerate(
        &self,
        page_size: usize,
        offset: usize,
        direction: Direction,
        exclude_pinned: bool,
    ) -> DatabaseResult<Vec<StoredDocument>>;

    fn clear(&self) -> DatabaseResult<()>;

    /// Guids of every stored record, in no particular order.
    fn guids(&self) -> DatabaseResult<Vec<Guid>>;

    /// Every stored record, oldest first.
    fn all(&self) -> DatabaseResult<Vec<StoredDocument>> {
        let total = self.count()? as usize;
        self.enumerate(total.max(1), 0, Direction::Next, false)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLITE
// ─────────────────────────────────────────────────────────────────────────────

const SELECT_COLUMNS: &str = "guid, language, url, hostname, filename, title, body, keywords, description, mime, date, hidden";

/// Thread-safe SQLite document store using connection pooling
///
/// WAL mode lets readers proceed without blocking each other.
pub struct SqliteDocumentStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteDocumentStore {
    /// Open or create a store at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA cache_size=-16000;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        let store = Self { pool };
        store.setup_schema()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let store = Self { pool };
        store.setup_schema()?;
        Ok(store)
    }

    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                guid TEXT UNIQUE,
                language TEXT NOT NULL,
                url TEXT NOT NULL,
                hostname TEXT NOT NULL,
                filename TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                keywords TEXT NOT NULL,
                description TEXT NOT NULL,
                mime TEXT NOT NULL,
                date TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                pinned INTEGER NOT NULL DEFAULT 0,
                hidden TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_timestamp ON documents(timestamp, seq);
        "#,
        )?;
        Ok(())
    }

    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<(StoredDocument, String)> {
        let language: String = row.get(1)?;
        let hidden_json: String = row.get(11)?;
        let doc = StoredDocument {
            guid: row.get(0)?,
            language: Language::resolve(&language),
            url: row.get(2)?,
            hostname: row.get(3)?,
            filename: row.get(4)?,
            title: row.get(5)?,
            body: row.get(6)?,
            keywords: row.get(7)?,
            description: row.get(8)?,
            mime: row.get(9)?,
            date: row.get(10)?,
            hidden: HiddenMeta::default(),
        };
        Ok((doc, hidden_json))
    }

    fn decode(parts: (StoredDocument, String)) -> DatabaseResult<StoredDocument> {
        let (mut doc, hidden_json) = parts;
        doc.hidden = serde_json::from_str(&hidden_json)?;
        Ok(doc)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn put(&self, record: &DocumentRecord) -> DatabaseResult<Guid> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        if let Some(guid) = &record.guid {
            let taken: Option<i64> = tx
                .query_row("SELECT seq FROM documents WHERE guid = ?1", [guid.as_str()], |row| row.get(0))
                .optional()?;
            if taken.is_some() {
                return Err(DatabaseError::DuplicateGuid(guid.to_string()));
            }
        }

        let hidden = serde_json::to_string(&record.hidden)?;
        tx.execute(
            r#"INSERT INTO documents (guid, language, url, hostname, filename, title, body, keywords, description, mime, date, timestamp, pinned, hidden)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            params![
                record.guid.as_ref().map(Guid::as_str),
                record.language.name(),
                record.url,
                record.hostname,
                record.filename,
                record.title,
                record.body,
                record.keywords,
                record.description,
                record.mime,
                record.date,
                record.hidden.timestamp.unwrap_or_default(),
                record.hidden.pinned,
                hidden,
            ],
        )?;
        let seq = tx.last_insert_rowid();

        let guid = match &record.guid {
            Some(guid) => guid.clone(),
            None => {
                // Auto guids are the row sequence; an explicit guid may already
                // occupy that text, in which case a suffix disambiguates.
                let mut candidate = seq.to_string();
                let mut attempt = 0u32;
                loop {
                    let taken: Option<i64> = tx
                        .query_row("SELECT seq FROM documents WHERE guid = ?1", [&candidate], |row| row.get(0))
                        .optional()?;
                    if taken.is_none() {
                        break;
                    }
                    attempt += 1;
                    candidate = format!("{}.{}", seq, attempt);
                }
                tx.execute("UPDATE documents SET guid = ?1 WHERE seq = ?2", params![candidate, seq])?;
                Guid::new(candidate)
            }
        };

        tx.commit()?;
        Ok(guid)
    }

    fn get(&self, guid: &Guid) -> DatabaseResult<StoredDocument> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM documents WHERE guid = ?1", SELECT_COLUMNS);
        let result = conn.query_row(&sql, [guid.as_str()], Self::row_to_document);
        match result {
            Ok(parts) => Self::decode(parts),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(DatabaseError::NotFound(guid.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, guids: &[Guid]) -> DatabaseResult<()> {
        if guids.is_empty() {
            return Ok(());
        }
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM documents WHERE guid = ?1")?;
            for guid in guids {
                stmt.execute([guid.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn guids(&self) -> DatabaseResult<Vec<Guid>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT guid FROM documents")?;
        let guids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|guid| guid.map(Guid::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(guids)
    }

    fn enumerate(
        &self,
        page_size: usize,
        offset: usize,
        direction: Direction,
        exclude_pinned: bool,
    ) -> DatabaseResult<Vec<StoredDocument>> {
        let conn = self.get_conn()?;
        let order = match direction {
            Direction::Next => "ASC",
            Direction::Prev => "DESC",
        };
        let filter = if exclude_pinned { "WHERE pinned = 0" } else { "" };
        let sql = format!(
            "SELECT {} FROM documents {} ORDER BY timestamp {order}, seq {order} LIMIT ?1 OFFSET ?2",
            SELECT_COLUMNS,
            filter,
            order = order
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![page_size as i64, offset as i64], Self::row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::decode).collect()
    }

    fn clear(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM documents", [])?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IN-MEMORY
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryRows {
    next_seq: u64,
    rows: BTreeMap<u64, StoredDocument>,
    by_guid: HashMap<Guid, u64>,
}

/// Document store held entirely in memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<MemoryRows>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn put(&self, record: &DocumentRecord) -> DatabaseResult<Guid> {
        let mut inner = self.inner.write();
        inner.next_seq += 1;
        let seq = inner.next_seq;

        let guid = match &record.guid {
            Some(guid) if inner.by_guid.contains_key(guid) => {
                return Err(DatabaseError::DuplicateGuid(guid.to_string()));
            }
            Some(guid) => guid.clone(),
            None => {
                let mut candidate = Guid::new(seq.to_string());
                let mut attempt = 0u32;
                while inner.by_guid.contains_key(&candidate) {
                    attempt += 1;
                    candidate = Guid::new(format!("{}.{}", seq, attempt));
                }
                candidate
            }
        };

        let doc = record.clone().into_stored(guid.clone());
        inner.rows.insert(seq, doc);
        inner.by_guid.insert(guid.clone(), seq);
        Ok(guid)
    }

    fn get(&self, guid: &Guid) -> DatabaseResult<StoredDocument> {
        let inner = self.inner.read();
        inner
            .by_guid
            .get(guid)
            .and_then(|seq| inner.rows.get(seq))
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(guid.to_string()))
    }

    fn delete(&self, guids: &[Guid]) -> DatabaseResult<()> {
        let mut inner = self.inner.write();
        for guid in guids {
            if let Some(seq) = inner.by_guid.remove(guid) {
                inner.rows.remove(&seq);
            }
        }
        Ok(())
    }

    fn count(&self) -> DatabaseResult<u64> {
        Ok(self.inner.read().rows.len() as u64)
    }

    fn guids(&self) -> DatabaseResult<Vec<Guid>> {
        Ok(self.inner.read().by_guid.keys().cloned().collect())
    }

    fn enumerate(
        &self,
        page_size: usize,
        offset: usize,
        direction: Direction,
        exclude_pinned: bool,
    ) -> DatabaseResult<Vec<StoredDocument>> {
        let inner = self.inner.read();
        let mut rows: Vec<(i64, u64, &StoredDocument)> = inner
            .rows
            .iter()
            .filter(|(_, doc)| !(exclude_pinned && doc.hidden.pinned))
            .map(|(seq, doc)| (doc.hidden.timestamp.unwrap_or_default(), *seq, doc))
            .collect();
        rows.sort_by_key(|(timestamp, seq, _)| (*timestamp, *seq));
        if direction == Direction::Prev {
            rows.reverse();
        }
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(page_size)
            .map(|(_, _, doc)| doc.clone())
            .collect())
    }

    fn clear(&self) -> DatabaseResult<()> {
        let mut inner = self.inner.write();
        inner.rows.clear();
        inner.by_guid.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::DocumentInput;

    fn record(title: &str, timestamp: i64, pinned: bool) -> DocumentRecord {
        let input = DocumentInput {
            url: format!("https://example.com/{}", title),
            title: title.to_string(),
            body: format!("body of {}", title),
            lang: "en".into(),
            ..Default::default()
        };
        let hidden = HiddenMeta {
            timestamp: Some(timestamp),
            pinned,
            tab_id: Some(7),
            ..Default::default()
        };
        DocumentRecord::new(input, hidden, 1024)
    }

    fn stores() -> Vec<Box<dyn DocumentStore>> {
        vec![
            Box::new(SqliteDocumentStore::open_in_memory().unwrap()),
            Box::new(MemoryDocumentStore::new()),
        ]
    }

    #[test]
    fn test_put_assigns_monotonic_guids() {
        for store in stores() {
            let a = store.put(&record("a", 1, false)).unwrap();
            let b = store.put(&record("b", 2, false)).unwrap();
            assert_eq!(a.as_str(), "1");
            assert_eq!(b.as_str(), "2");
            assert_eq!(store.count().unwrap(), 2);
        }
    }

    #[test]
    fn test_guids_lists_live_records() {
        for store in stores() {
            let a = store.put(&record("a", 1, false)).unwrap();
            let b = store.put(&record("b", 2, false)).unwrap();
            store.delete(&[a]).unwrap();
            assert_eq!(store.guids().unwrap(), vec![b]);
        }
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        for store in stores() {
            let rec = record("roundtrip", 10, false);
            let guid = store.put(&rec).unwrap();
            let stored = store.get(&guid).unwrap();
            assert_eq!(stored, rec.clone().into_stored(guid));
            assert_eq!(stored.hidden.tab_id, Some(7));
        }
    }

    #[test]
    fn test_get_missing_is_not_found() {
        for store in stores() {
            let err = store.get(&Guid::new("404")).unwrap_err();
            assert!(matches!(err, DatabaseError::NotFound(ref g) if g == "404"));
        }
    }

    #[test]
    fn test_explicit_guid_and_duplicate_rejected() {
        for store in stores() {
            let mut rec = record("x", 1, false);
            rec.guid = Some(Guid::new("tab-1"));
            assert_eq!(store.put(&rec).unwrap().as_str(), "tab-1");
            assert!(matches!(store.put(&rec), Err(DatabaseError::DuplicateGuid(_))));
            assert_eq!(store.count().unwrap(), 1);
        }
    }

    #[test]
    fn test_auto_guid_skips_explicit_collision() {
        for store in stores() {
            let mut rec = record("x", 1, false);
            rec.guid = Some(Guid::new("2"));
            store.put(&rec).unwrap();
            let auto = store.put(&record("y", 2, false)).unwrap();
            assert_ne!(auto.as_str(), "2");
            assert!(store.get(&auto).is_ok());
        }
    }

    #[test]
    fn test_delete_is_idempotent() {
        for store in stores() {
            let guid = store.put(&record("gone", 1, false)).unwrap();
            store.delete(&[guid.clone()]).unwrap();
            store.delete(&[guid.clone()]).unwrap();
            assert!(store.get(&guid).is_err());
            assert_eq!(store.count().unwrap(), 0);
        }
    }

    #[test]
    fn test_enumerate_directions_and_pinned() {
        for store in stores() {
            store.put(&record("old", 100, false)).unwrap();
            store.put(&record("pinned", 200, true)).unwrap();
            store.put(&record("new", 300, false)).unwrap();

            let forward: Vec<String> = store
                .enumerate(10, 0, Direction::Next, false)
                .unwrap()
                .into_iter()
                .map(|d| d.title)
                .collect();
            assert_eq!(forward, vec!["old", "pinned", "new"]);

            let backward: Vec<String> = store
                .enumerate(10, 0, Direction::Prev, true)
                .unwrap()
                .into_iter()
                .map(|d| d.title)
                .collect();
            assert_eq!(backward, vec!["new", "old"]);

            let page = store.enumerate(1, 1, Direction::Next, false).unwrap();
            assert_eq!(page[0].title, "pinned");
        }
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        for store in stores() {
            store.put(&record("first", 5, false)).unwrap();
            store.put(&record("second", 5, false)).unwrap();
            let titles: Vec<String> = store.all().unwrap().into_iter().map(|d| d.title).collect();
            assert_eq!(titles, vec!["first", "second"]);
        }
    }

    #[test]
    fn test_clear() {
        for store in stores() {
            store.put(&record("a", 1, false)).unwrap();
            store.clear().unwrap();
            assert_eq!(store.count().unwrap(), 0);
            assert!(store.all().unwrap().is_empty());
        }
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("documents.sqlite");
        let guid = {
            let store = SqliteDocumentStore::open(&path).unwrap();
            store.put(&record("durable", 1, false)).unwrap()
        };
        let store = SqliteDocumentStore::open(&path).unwrap();
        assert_eq!(store.get(&guid).unwrap().title, "durable");
    }
}
