//! SearchEngine - main API for foreign callers
//!
//! Owns the document stores, the partitions and the source table, and is
//! exported through UniFFI.
//!
//! Store writes happen before index writes and removals go the other way,
//! so every indexed guid resolves to a stored document.

use crate::config::EngineConfig;
use crate::content_detection;
use crate::database::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};
use crate::indexer::{Indexer, Location, PartitionId, QueryOptions, PRIMARY_PARTITION};
use crate::interface::{
    BatchOutcome, DeepSearchHit, Direction, DocumentInput, HiddenMeta, IndexingReport, PartitionStats,
    SearchError, SearchHit, SearchRequest, SearchSummary, SourceDocument, SourceSnapshot, StoredDocument,
};
use crate::language::{LanguageProfile, LanguageRegistry};
use crate::models::{DocumentRecord, Field, Guid, IndexableDocument};
use crate::search;
use crate::sources::{IndexingPass, SourceStatus, SourceTable};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Once};
use tracing::{debug, info, warn};

/// Global fallback Tokio runtime for async calls made outside any runtime
/// (UniFFI does not provide one). Shared by every engine, never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

static RAYON_INIT: Once = Once::new();

/// Initialize the global Rayon pool used for document analysis, at low
/// priority and leaving two cores to Tokio.
fn init_rayon() {
    RAYON_INIT.call_once(|| {
        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let rayon_threads = num_threads.saturating_sub(2).max(1);

        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(rayon_threads)
            .thread_name(|i| format!("tabsearch-rayon-{}", i))
            .start_handler(|_| {
                use thread_priority::*;
                let _ = set_current_thread_priority(ThreadPriority::Min);
            })
            .build_global();
    });
}

/// Current runtime if there is one, otherwise the global fallback.
fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

/// Thread-safe search engine over a document store and an inverted index
///
/// Concurrency Model:
/// - Each partition is behind its own mutex inside the `Indexer`
/// - The SQLite store uses an r2d2 pool, so document reads never queue
/// - Batch analysis runs on the global Rayon pool
#[derive(uniffi::Object)]
pub struct SearchEngine {
    config: EngineConfig,
    registry: Arc<LanguageRegistry>,
    indexer: Arc<Indexer>,
    stores: RwLock<HashMap<PartitionId, Arc<dyn DocumentStore>>>,
    sources: Mutex<SourceTable>,
}

// Internal implementation (not exported via FFI)
impl SearchEngine {
    fn build(config: EngineConfig) -> Result<Self, SearchError> {
        init_rayon();
        let registry = Arc::new(LanguageRegistry::new());
        let indexer = Arc::new(Indexer::new(Arc::clone(&registry), config.field_weights()));

        let primary: Arc<dyn DocumentStore> = match config.database_path() {
            Some(path) => Arc::new(SqliteDocumentStore::open(path)?),
            None => Arc::new(MemoryDocumentStore::new()),
        };
        let location = match config.index_dir() {
            Some(dir) => Location::Directory(dir),
            None => Location::Memory("primary".to_string()),
        };
        indexer.prepare(PRIMARY_PARTITION, location)?;

        let sources = match config.sources_path() {
            Some(path) => SourceTable::load(&path)?,
            None => SourceTable::default(),
        };

        let engine = Self {
            config,
            registry,
            indexer,
            stores: RwLock::new(HashMap::from([(PRIMARY_PARTITION, primary)])),
            sources: Mutex::new(sources),
        };
        engine.rebuild_index_if_needed()?;
        info!(documents = engine.count()?, "search engine ready");
        Ok(engine)
    }

    /// Re-index the primary partition from the store when the two hold
    /// different guids, e.g. after adds or removals that were never committed.
    fn rebuild_index_if_needed(&self) -> Result<(), SearchError> {
        if self.config.database_path.is_none() {
            return Ok(());
        }
        let store = self.store(PRIMARY_PARTITION)?;
        let stored = store.guids()?;
        if self.indexer.holds_exactly(PRIMARY_PARTITION, &stored)? {
            return Ok(());
        }

        let indexed = self.indexer.counts(PRIMARY_PARTITION)?.documents;
        warn!(stored = stored.len(), indexed, "index out of sync with document store, rebuilding");
        let docs: Vec<IndexableDocument> = store.all()?.iter().map(IndexableDocument::from).collect();
        self.indexer.clear(PRIMARY_PARTITION)?;
        self.indexer.add_batch(PRIMARY_PARTITION, docs)?;
        self.indexer.commit(PRIMARY_PARTITION)?;
        self.indexer.compact(PRIMARY_PARTITION, None)?;
        Ok(())
    }

    fn store(&self, partition: PartitionId) -> Result<Arc<dyn DocumentStore>, SearchError> {
        self.stores
            .read()
            .get(&partition)
            .cloned()
            .ok_or_else(|| SearchError::PartitionError(format!("partition {partition} is not prepared")))
    }

    /// Profile for a language tag; an empty tag means the configured default.
    fn profile_for(&self, language_tag: &str) -> LanguageProfile {
        if language_tag.trim().is_empty() {
            self.registry.resolve(&self.config.default_language)
        } else {
            self.registry.resolve(language_tag)
        }
    }

    fn max_content_length(&self) -> usize {
        usize::try_from(self.config.max_content_length).unwrap_or(usize::MAX)
    }

    /// Store then index a batch. Records that cannot be stored are skipped
    /// and counted; an indexing failure rolls the stored records back.
    fn add_records(&self, partition: PartitionId, records: Vec<DocumentRecord>) -> Result<BatchOutcome, SearchError> {
        let store = self.store(partition)?;
        let mut ignored = 0u32;
        let mut guids = Vec::with_capacity(records.len());
        let mut indexable = Vec::with_capacity(records.len());

        for record in records {
            if record.is_empty() {
                warn!(url = %record.url, "skipping document without url, title or body");
                ignored += 1;
                continue;
            }
            match store.put(&record) {
                Ok(guid) => {
                    indexable.push(record.to_indexable(guid.clone()));
                    guids.push(guid);
                }
                Err(e) => {
                    warn!(url = %record.url, error = %e, "skipping document that could not be stored");
                    ignored += 1;
                }
            }
        }

        if let Err(e) = self.indexer.add_batch(partition, indexable) {
            if let Err(rollback) = store.delete(&guids) {
                warn!(error = %rollback, "rollback of stored documents failed");
            }
            return Err(e.into());
        }

        debug!(partition, added = guids.len(), ignored, "batch indexed");
        Ok(BatchOutcome {
            guids: guids.into_iter().map(Guid::into_string).collect(),
            ignored,
        })
    }

    fn remove_guids(&self, partition: PartitionId, guids: &[Guid]) -> Result<(), SearchError> {
        if guids.is_empty() {
            return Ok(());
        }
        let store = self.store(partition)?;
        self.indexer.remove(partition, guids)?;
        store.delete(guids)?;
        Ok(())
    }

    fn query_options(&self, request: &SearchRequest) -> QueryOptions {
        QueryOptions {
            text: request.query.clone(),
            start: request.start as usize,
            length: request.length as usize,
            partial: request.partial,
            spell_correction: request.spell_correction,
            synonyms: request.synonyms,
            descending: request.descending,
        }
    }

    fn save_sources(&self, table: &SourceTable) -> Result<(), SearchError> {
        if let Some(path) = self.config.sources_path() {
            table.save(&path)?;
        }
        Ok(())
    }

    fn index_sources(
        &self,
        pass: &mut IndexingPass,
        sources: Vec<SourceSnapshot>,
        report: &mut IndexingReport,
    ) -> Result<(), SearchError> {
        let max = self.max_content_length();
        for source in sources {
            if source.skip || !content_detection::is_indexable_url(&source.url) {
                report.ignored += 1;
                continue;
            }
            match pass.check(&source.source_id, &source.url) {
                SourceStatus::Unchanged { guids } => {
                    report.docs += guids.len() as u32;
                    continue;
                }
                SourceStatus::Changed { stale } => {
                    debug!(source = %source.source_id, documents = stale.len(), "re-indexing changed source");
                    if let Err(e) = self.remove_guids(PRIMARY_PARTITION, &stale) {
                        pass.retry(&source.source_id, &source.url, stale);
                        return Err(e);
                    }
                    report.removed += stale.len() as u32;
                }
                SourceStatus::New => {}
            }

            let records = source
                .documents
                .into_iter()
                .map(|doc| DocumentRecord::new(doc.record, doc.hidden, max))
                .collect();
            let outcome = self.add_records(PRIMARY_PARTITION, records)?;
            report.docs += outcome.guids.len() as u32;
            report.ignored += outcome.ignored;
            pass.record(
                &source.source_id,
                &source.url,
                outcome.guids.into_iter().map(Guid::from).collect(),
            );
        }
        Ok(())
    }

    /// Index paragraph chunks into a scratch partition and rank them.
    fn rank_chunks(
        &self,
        scratch: PartitionId,
        chunks: &[String],
        query: &str,
        profile: &LanguageProfile,
    ) -> Result<Vec<DeepSearchHit>, SearchError> {
        let docs = chunks
            .iter()
            .enumerate()
            .map(|(i, text)| IndexableDocument::new(i.to_string(), profile.language(), vec![(Field::Body, text.clone())]))
            .collect();
        self.indexer.add_batch(scratch, docs)?;

        let mut options = QueryOptions::new(query);
        options.length = chunks.len();
        options.partial = self.config.partial;
        options.spell_correction = self.config.spell_correction;
        self.indexer.query(scratch, profile, &options)?;

        let (_, terms) = self.indexer.result_terms(scratch)?;
        let snippet_size = self.config.snippet_size as usize;
        let hits = self.indexer.result_hits(scratch)?;
        Ok(hits
            .into_iter()
            .enumerate()
            .filter_map(|(rank, hit)| {
                let chunk = chunks.get(hit.guid.as_str().parse::<usize>().ok()?)?;
                Some(DeepSearchHit {
                    rank: rank as u32,
                    percent: hit.percent,
                    snippet: search::snippet(profile, chunk, snippet_size, "", &terms),
                })
            })
            .collect())
    }
}

/// Open an engine without blocking the caller: partitions are prepared
/// (journals replayed, index rebuilt if needed) on a blocking thread.
#[uniffi::export]
pub async fn open_engine(config: EngineConfig) -> Result<Arc<SearchEngine>, SearchError> {
    let handle = runtime_handle().spawn_blocking(move || SearchEngine::build(config));
    match handle.await {
        Ok(result) => result.map(Arc::new),
        Err(e) => Err(SearchError::StorageError(format!("engine initialization aborted: {e}"))),
    }
}

// FFI-exported constructors (must be in standalone impl block)
#[uniffi::export]
impl SearchEngine {
    /// Open or create an engine as configured.
    #[uniffi::constructor]
    pub fn new(config: EngineConfig) -> Result<Self, SearchError> {
        Self::build(config)
    }

    /// An engine with an in-memory store and index.
    #[uniffi::constructor]
    pub fn new_in_memory() -> Result<Self, SearchError> {
        Self::build(EngineConfig::default())
    }
}

#[uniffi::export]
impl SearchEngine {
    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Store and index one document, returning its guid.
    pub fn add_document(&self, input: DocumentInput, hidden: HiddenMeta) -> Result<String, SearchError> {
        let record = DocumentRecord::new(input, hidden, self.max_content_length());
        if record.is_empty() {
            return Err(SearchError::InvalidInput("document has no url, title or body".into()));
        }
        let mut outcome = self.add_records(PRIMARY_PARTITION, vec![record])?;
        match outcome.guids.pop() {
            Some(guid) => Ok(guid),
            None => Err(SearchError::StorageError("document could not be stored".into())),
        }
    }

    /// Store and index a batch; failures are skipped and counted.
    pub fn add_documents(&self, batch: Vec<SourceDocument>) -> Result<BatchOutcome, SearchError> {
        self.add_documents_to(PRIMARY_PARTITION, batch)
    }

    pub fn add_documents_to(&self, partition: u32, batch: Vec<SourceDocument>) -> Result<BatchOutcome, SearchError> {
        let max = self.max_content_length();
        let records = batch
            .into_iter()
            .map(|doc| DocumentRecord::new(doc.record, doc.hidden, max))
            .collect();
        self.add_records(partition, records)
    }

    /// Index the url/title stand-in a collector hands over when it ran out
    /// of time on a source.
    pub fn add_placeholder(&self, url: String, title: String, hidden: HiddenMeta) -> Result<String, SearchError> {
        let record = DocumentRecord::placeholder(&url, &title, hidden);
        let mut outcome = self.add_records(PRIMARY_PARTITION, vec![record])?;
        outcome
            .guids
            .pop()
            .ok_or_else(|| SearchError::InvalidInput("placeholder has neither url nor title".into()))
    }

    /// Remove documents from the index and the store. Unknown guids are ignored.
    pub fn remove_documents(&self, guids: Vec<String>) -> Result<(), SearchError> {
        let guids: Vec<Guid> = guids.into_iter().map(Guid::from).collect();
        self.remove_guids(PRIMARY_PARTITION, &guids)
    }

    pub fn add_synonym(&self, term: String, synonym: String) -> Result<(), SearchError> {
        self.indexer.add_synonym(PRIMARY_PARTITION, &term, &synonym)?;
        Ok(())
    }

    /// Drop every document of the primary partition and forget all sources.
    pub fn reset_partition(&self) -> Result<(), SearchError> {
        self.indexer.clear(PRIMARY_PARTITION)?;
        self.store(PRIMARY_PARTITION)?.clear()?;
        let mut sources = self.sources.lock();
        sources.reset();
        self.save_sources(&sources)?;
        drop(sources);
        self.indexer.commit(PRIMARY_PARTITION)?;
        self.indexer.compact(PRIMARY_PARTITION, None)?;
        info!("primary partition reset");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Durability
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn commit(&self) -> Result<(), SearchError> {
        self.indexer.commit(PRIMARY_PARTITION)?;
        Ok(())
    }

    /// Commit, then compact the primary partition and persist the source table.
    pub fn sync(&self) -> Result<(), SearchError> {
        self.indexer.commit(PRIMARY_PARTITION)?;
        self.indexer.compact(PRIMARY_PARTITION, None)?;
        let sources = self.sources.lock();
        self.save_sources(&sources)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────────────

    /// Run a query on the primary partition; hits are read with the
    /// per-rank accessors until the next search.
    pub fn search(&self, request: SearchRequest) -> Result<SearchSummary, SearchError> {
        self.search_partition(PRIMARY_PARTITION, request)
    }

    pub fn search_partition(&self, partition: u32, request: SearchRequest) -> Result<SearchSummary, SearchError> {
        #[cfg(feature = "perf-log")]
        let started = std::time::Instant::now();

        let profile = self.profile_for(&request.language_tag);
        let outcome = self.indexer.query(partition, &profile, &self.query_options(&request))?;

        #[cfg(feature = "perf-log")]
        info!(
            partition,
            query = %request.query,
            elapsed_us = started.elapsed().as_micros() as u64,
            "search timing"
        );

        Ok(SearchSummary {
            size: outcome.matched as u32,
            estimated_total: outcome.estimated_total,
            widened: outcome.widened,
        })
    }

    pub fn guid_at(&self, rank: u32) -> Result<String, SearchError> {
        Ok(self.indexer.result_guid(PRIMARY_PARTITION, rank)?.into_string())
    }

    pub fn percent_at(&self, rank: u32) -> Result<u32, SearchError> {
        Ok(self.indexer.result_percent(PRIMARY_PARTITION, rank)?)
    }

    /// The whole active page of the primary partition.
    pub fn hits(&self) -> Result<Vec<SearchHit>, SearchError> {
        self.hits_in(PRIMARY_PARTITION)
    }

    pub fn hits_in(&self, partition: u32) -> Result<Vec<SearchHit>, SearchError> {
        Ok(self
            .indexer
            .result_hits(partition)?
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| SearchHit {
                rank: rank as u32,
                guid: hit.guid.into_string(),
                percent: hit.percent,
            })
            .collect())
    }

    /// Highlighted excerpt of the body of the hit at `rank`.
    pub fn snippet_at(&self, rank: u32, max_length: u32) -> Result<String, SearchError> {
        let guid = self.indexer.result_guid(PRIMARY_PARTITION, rank)?;
        let doc = self.store(PRIMARY_PARTITION)?.get(&guid)?;
        let (language, terms) = self.indexer.result_terms(PRIMARY_PARTITION)?;
        let profile = self.registry.profile(language);
        Ok(search::snippet(&profile, &doc.body, max_length as usize, "", &terms))
    }

    pub fn document_at(&self, rank: u32) -> Result<StoredDocument, SearchError> {
        let guid = self.indexer.result_guid(PRIMARY_PARTITION, rank)?;
        Ok(self.store(PRIMARY_PARTITION)?.get(&guid)?)
    }

    pub fn document(&self, guid: String) -> Result<StoredDocument, SearchError> {
        Ok(self.store(PRIMARY_PARTITION)?.get(&Guid::from(guid))?)
    }

    /// Highlight arbitrary content with the terms of the active result set,
    /// skipping terms that also occur in `omit` (text already on screen).
    pub fn snippet_for(
        &self,
        content: String,
        language_tag: String,
        max_length: u32,
        omit: String,
    ) -> Result<String, SearchError> {
        let (_, terms) = self.indexer.result_terms(PRIMARY_PARTITION)?;
        let profile = self.profile_for(&language_tag);
        Ok(search::snippet(&profile, &content, max_length as usize, &omit, &terms))
    }

    /// Rank the paragraphs of one stored document against `query`.
    /// An empty language tag uses the document's own language.
    pub fn deep_search(&self, guid: String, query: String, language_tag: String) -> Result<Vec<DeepSearchHit>, SearchError> {
        let doc = self.document(guid)?;
        let chunks = content_detection::split_paragraphs(&doc.body, self.config.snippet_size as usize);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let profile = if language_tag.trim().is_empty() {
            self.registry.profile(doc.language)
        } else {
            self.registry.resolve(&language_tag)
        };

        let scratch = self.indexer.prepare_scratch("deep-search")?;
        let result = self.rank_chunks(scratch, &chunks, &query, &profile);
        if let Err(e) = self.indexer.release(scratch) {
            warn!(partition = scratch, error = %e, "failed to release deep search partition");
        }
        result
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Partitions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Prepare an in-memory partition with its own store; returns its handle.
    pub fn new_scratch_partition(&self, name: String) -> Result<u32, SearchError> {
        let id = self.indexer.prepare_scratch(&name)?;
        self.stores.write().insert(id, Arc::new(MemoryDocumentStore::new()));
        Ok(id)
    }

    pub fn release_scratch_partition(&self, handle: u32) -> Result<(), SearchError> {
        if handle == PRIMARY_PARTITION {
            return Err(SearchError::PartitionError("the primary partition cannot be released".into()));
        }
        self.indexer.release(handle)?;
        self.stores.write().remove(&handle);
        Ok(())
    }

    pub fn stats(&self, partition: u32) -> Result<PartitionStats, SearchError> {
        let counts = self.indexer.counts(partition)?;
        Ok(PartitionStats {
            documents: counts.documents,
            terms: counts.terms,
            pending: counts.pending,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Indexing passes
    // ─────────────────────────────────────────────────────────────────────────────

    /// Bring the primary partition in line with the current sources:
    /// unchanged sources are kept, changed ones replaced, vanished ones
    /// dropped. Ends with a commit.
    ///
    /// When a source fails, the pass stops there; the source table still
    /// records everything indexed so far and sources not reached keep their
    /// previous entries.
    pub fn run_indexing_pass(&self, sources: Vec<SourceSnapshot>) -> Result<IndexingReport, SearchError> {
        let mut table = self.sources.lock();
        let mut pass = table.clone().begin_pass();
        let mut report = IndexingReport::default();

        let walked = self
            .index_sources(&mut pass, sources, &mut report)
            .and_then(|()| self.remove_guids(PRIMARY_PARTITION, &pass.orphaned()));
        if let Err(e) = walked {
            warn!(error = %e, "indexing pass interrupted");
            *table = pass.interrupt();
            if let Err(save) = self.save_sources(&table) {
                warn!(error = %save, "failed to save source table after interrupted pass");
            }
            if let Err(commit) = self.indexer.commit(PRIMARY_PARTITION) {
                warn!(error = %commit, "failed to commit after interrupted pass");
            }
            return Err(e);
        }

        let (next, orphaned) = pass.finish();
        report.removed += orphaned.len() as u32;
        *table = next;
        self.save_sources(&table)?;
        let tracked = table.len();
        drop(table);
        self.indexer.commit(PRIMARY_PARTITION)?;

        info!(docs = report.docs, ignored = report.ignored, removed = report.removed, sources = tracked, "indexing pass complete");
        Ok(report)
    }

    /// Force these sources to be rebuilt on the next pass.
    pub fn mark_for_reindex(&self, source_ids: Vec<String>) -> Result<(), SearchError> {
        let mut table = self.sources.lock();
        table.mark_for_reindex(source_ids);
        self.save_sources(&table)
    }

    /// Guids indexed for a source by the last pass; empty when untracked.
    pub fn source_guids(&self, source_id: String) -> Vec<String> {
        self.sources
            .lock()
            .get(&source_id)
            .map(|source| source.guids.iter().map(|g| g.as_str().to_string()).collect())
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────────

    /// Page through stored documents by insertion time. With `trash`,
    /// pinned documents are skipped.
    pub fn records(&self, number: u32, offset: u32, direction: Direction, trash: bool) -> Result<Vec<StoredDocument>, SearchError> {
        Ok(self
            .store(PRIMARY_PARTITION)?
            .enumerate(number as usize, offset as usize, direction, trash)?)
    }

    pub fn count(&self) -> Result<u64, SearchError> {
        Ok(self.store(PRIMARY_PARTITION)?.count()?)
    }

    pub fn languages(&self) -> Vec<String> {
        self.registry.languages()
    }

    pub fn config(&self) -> EngineConfig {
        self.config.clone()
    }
}
