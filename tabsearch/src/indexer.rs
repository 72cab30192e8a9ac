//! Inverted index engine
//!
//! A `Partition` is an isolated index: per-language term dictionaries, the
//! documents posted into them, pending journal operations and the cursor of
//! the last query. The `Indexer` owns every open partition, each behind its
//! own mutex, so distinct partitions never contend and mutations and queries
//! on one partition are serialized.

use crate::candidate::IndexCandidate;
use crate::dictionary::{Posting, TermDictionary};
use crate::journal::{Journal, JournalEntry, JournalError, Snapshot};
use crate::language::{Language, LanguageProfile, LanguageRegistry};
use crate::models::{Field, FieldWeights, Guid, IndexableDocument};
use crate::query::{self, Clause, ClauseKind, QueryError, QueryPlan};
use crate::ranking::{order_hits, percent, Bm25, ScoredDoc};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Small integer naming a partition. 0 is the primary partition; scratch
/// partitions are allocated above it.
pub type PartitionId = u32;

pub const PRIMARY_PARTITION: PartitionId = 0;

/// Error type for indexer operations
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("partition {0} is not prepared")]
    NotPrepared(PartitionId),
    #[error("no active result set")]
    NoResults,
    #[error("rank {rank} is out of range for a result set of {size}")]
    RankOutOfRange { rank: u32, size: u32 },
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),
}

pub type IndexerResult<T> = Result<T, IndexerError>;

/// Where a partition lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Held in memory only; the name is informational.
    Memory(String),
    /// Snapshot and journal in a directory.
    Directory(PathBuf),
}

/// Options of one ranked query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub text: String,
    pub start: usize,
    pub length: usize,
    pub partial: bool,
    pub spell_correction: bool,
    pub synonyms: bool,
    pub descending: bool,
}

impl QueryOptions {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start: 0,
            length: 30,
            partial: false,
            spell_correction: false,
            synonyms: false,
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryOutcome {
    /// Hits materialized in the cursor page.
    pub matched: usize,
    pub estimated_total: u64,
    pub widened: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub guid: Guid,
    pub seq: u64,
    pub score: f32,
    pub percent: u32,
}

/// The page produced by the last query on a partition.
#[derive(Debug, Clone)]
pub struct ResultCursor {
    pub hits: Vec<RankedHit>,
    pub total: u64,
    /// Normalized terms the query resolved to; drives snippet highlighting.
    pub terms: HashSet<String>,
    pub language: Language,
    pub widened: bool,
}

impl ResultCursor {
    fn hit(&self, rank: u32) -> IndexerResult<&RankedHit> {
        self.hits.get(rank as usize).ok_or(IndexerError::RankOutOfRange {
            rank,
            size: self.hits.len() as u32,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionCounts {
    pub documents: u64,
    pub terms: u64,
    pub pending: u64,
}

#[derive(Debug)]
struct DocEntry {
    guid: Guid,
    language: Language,
    length: u32,
    terms: Vec<String>,
    surfaces: Vec<String>,
    source: IndexableDocument,
}

/// A clause after analysis and dictionary expansion.
#[derive(Debug)]
enum Resolved {
    Terms { field: Option<Field>, terms: Vec<String> },
    Phrase { field: Option<Field>, terms: Vec<(u32, String)> },
}

impl Resolved {
    fn terms(&self) -> Vec<String> {
        match self {
            Resolved::Terms { terms, .. } => terms.clone(),
            Resolved::Phrase { terms, .. } => terms.iter().map(|(_, t)| t.clone()).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct Execution {
    hits: Vec<ScoredDoc>,
    terms: HashSet<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// PARTITION
// ─────────────────────────────────────────────────────────────────────────────

pub struct Partition {
    location: Location,
    journal: Option<Journal>,
    weights: FieldWeights,
    bm25: Bm25,
    dictionaries: HashMap<Language, TermDictionary>,
    docs: BTreeMap<u64, DocEntry>,
    by_guid: HashMap<Guid, u64>,
    next_seq: u64,
    synonyms: BTreeMap<String, BTreeSet<String>>,
    pending: Vec<JournalEntry>,
    cursor: Option<ResultCursor>,
}

impl Partition {
    fn empty(location: Location, journal: Option<Journal>, weights: FieldWeights) -> Self {
        Self {
            location,
            journal,
            weights,
            bm25: Bm25::default(),
            dictionaries: HashMap::new(),
            docs: BTreeMap::new(),
            by_guid: HashMap::new(),
            next_seq: 0,
            synonyms: BTreeMap::new(),
            pending: Vec::new(),
            cursor: None,
        }
    }

    /// Open a partition, replaying committed state for directory locations.
    pub fn open(location: Location, registry: &LanguageRegistry, weights: FieldWeights) -> IndexerResult<Self> {
        let journal = match &location {
            Location::Memory(_) => None,
            Location::Directory(dir) => Some(Journal::open(dir)?),
        };
        let entries = match &journal {
            Some(journal) => journal.load()?,
            None => Vec::new(),
        };
        let mut partition = Self::empty(location, journal, weights);
        partition.replay(entries, registry);
        Ok(partition)
    }

    fn replay(&mut self, entries: Vec<JournalEntry>, registry: &LanguageRegistry) {
        let mut batch: Vec<IndexableDocument> = Vec::new();
        for entry in entries {
            match entry {
                JournalEntry::Add { document } => batch.push(document),
                other => {
                    self.flush_replay_batch(&mut batch, registry);
                    match other {
                        JournalEntry::Remove { guids } => {
                            self.remove_postings(&guids);
                        }
                        JournalEntry::Clear => self.clear_postings(),
                        JournalEntry::Synonym { term, synonym } => {
                            self.synonyms.entry(term).or_default().insert(synonym);
                        }
                        JournalEntry::Add { .. } => {}
                    }
                }
            }
        }
        self.flush_replay_batch(&mut batch, registry);
    }

    fn flush_replay_batch(&mut self, batch: &mut Vec<IndexableDocument>, registry: &LanguageRegistry) {
        if batch.is_empty() {
            return;
        }
        let candidates = analyze_batch(std::mem::take(batch), registry);
        for candidate in candidates {
            self.insert_candidate(candidate);
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Whether the indexed documents are exactly `guids` (given without duplicates).
    pub fn holds_exactly(&self, guids: &[Guid]) -> bool {
        self.by_guid.len() == guids.len() && guids.iter().all(|g| self.by_guid.contains_key(g))
    }

    pub fn counts(&self) -> PartitionCounts {
        PartitionCounts {
            documents: self.docs.len() as u64,
            terms: self.dictionaries.values().map(TermDictionary::term_count).sum(),
            pending: self.pending.len() as u64,
        }
    }

    /// Post analyzed documents. A guid that is already present is replaced.
    pub fn add(&mut self, candidates: Vec<IndexCandidate>) {
        for candidate in candidates {
            self.pending.push(JournalEntry::Add { document: candidate.doc.clone() });
            self.insert_candidate(candidate);
        }
    }

    fn insert_candidate(&mut self, candidate: IndexCandidate) {
        let guid = candidate.doc.guid.clone();
        if self.by_guid.contains_key(&guid) {
            self.remove_postings(std::slice::from_ref(&guid));
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        let language = candidate.doc.language;
        self.dictionaries.entry(language).or_default().insert(seq, &candidate);

        let IndexCandidate { doc, postings, surfaces, length } = candidate;
        self.docs.insert(
            seq,
            DocEntry {
                guid: guid.clone(),
                language,
                length,
                terms: postings.into_keys().collect(),
                surfaces: surfaces.into_keys().collect(),
                source: doc,
            },
        );
        self.by_guid.insert(guid, seq);
    }

    /// Remove documents; unknown guids are ignored. Returns how many were removed.
    pub fn remove(&mut self, guids: &[Guid]) -> usize {
        let removed = self.remove_postings(guids);
        if !removed.is_empty() {
            self.pending.push(JournalEntry::Remove { guids: removed.clone() });
            let stale = self
                .cursor
                .as_ref()
                .is_some_and(|c| c.hits.iter().any(|h| removed.contains(&h.guid)));
            if stale {
                self.cursor = None;
            }
        }
        removed.len()
    }

    fn remove_postings(&mut self, guids: &[Guid]) -> Vec<Guid> {
        let mut removed = Vec::new();
        for guid in guids {
            let Some(seq) = self.by_guid.remove(guid) else {
                continue;
            };
            if let Some(entry) = self.docs.remove(&seq) {
                if let Some(dict) = self.dictionaries.get_mut(&entry.language) {
                    dict.remove(seq, &entry.terms, &entry.surfaces, entry.length);
                }
                removed.push(entry.guid);
            }
        }
        removed
    }

    /// Drop every document.
    pub fn clear(&mut self) {
        self.clear_postings();
        self.pending.push(JournalEntry::Clear);
        self.cursor = None;
    }

    fn clear_postings(&mut self) {
        self.dictionaries.clear();
        self.docs.clear();
        self.by_guid.clear();
    }

    pub fn add_synonym(&mut self, term: &str, synonym: &str) {
        let term = term.trim().to_lowercase();
        let synonym = synonym.trim().to_lowercase();
        if term.is_empty() || synonym.is_empty() || term == synonym {
            return;
        }
        if self.synonyms.entry(term.clone()).or_default().insert(synonym.clone()) {
            self.pending.push(JournalEntry::Synonym { term, synonym });
        }
    }

    /// Append pending operations to the journal. Memory partitions just
    /// forget them. On failure the operations stay pending.
    pub fn commit(&mut self) -> IndexerResult<usize> {
        let count = self.pending.len();
        if let Some(journal) = &self.journal {
            journal.append(&self.pending)?;
        }
        self.pending.clear();
        Ok(count)
    }

    /// Rewrite durable storage from the live state, optionally moving the
    /// partition to a new directory.
    pub fn compact(&mut self, target: Option<PathBuf>) -> IndexerResult<()> {
        if let Some(dir) = target {
            self.journal = Some(Journal::open(&dir)?);
            self.location = Location::Directory(dir);
        }
        if let Some(journal) = &self.journal {
            let documents = self.docs.values().map(|e| e.source.clone()).collect();
            let synonyms = self
                .synonyms
                .iter()
                .flat_map(|(t, syns)| syns.iter().map(move |s| (t.clone(), s.clone())))
                .collect();
            journal.rewrite(&Snapshot::new(documents, synonyms))?;
        }
        self.pending.clear();
        Ok(())
    }

    /// Bytes of durable storage; 0 for memory partitions.
    pub fn durable_size(&self) -> u64 {
        self.journal.as_ref().map_or(0, Journal::size)
    }

    // ── querying ────────────────────────────────────────────────

    /// Run a query and replace the cursor with its page of results.
    pub fn query(&mut self, profile: &LanguageProfile, options: &QueryOptions) -> IndexerResult<QueryOutcome> {
        let plan = query::parse(&options.text)?;

        let mut execution = self.execute(&plan, profile, options);
        let mut widened = false;
        if execution.hits.is_empty() && query::can_widen(&options.text) {
            if let Some(loose) = plan.widened() {
                let retry = self.execute(&loose, profile, options);
                debug!(query = %options.text, hits = retry.hits.len(), "widened last token");
                if !retry.hits.is_empty() {
                    execution = retry;
                    widened = true;
                }
            }
        }

        let Execution { mut hits, terms } = execution;
        order_hits(&mut hits, options.descending);
        let top = hits.iter().map(|h| h.score).fold(0.0f32, f32::max);
        let total = hits.len() as u64;

        let page: Vec<RankedHit> = hits
            .into_iter()
            .skip(options.start)
            .take(options.length)
            .filter_map(|h| {
                self.docs.get(&h.seq).map(|entry| RankedHit {
                    guid: entry.guid.clone(),
                    seq: h.seq,
                    score: h.score,
                    percent: percent(h.score, top, h.coverage),
                })
            })
            .collect();

        let outcome = QueryOutcome { matched: page.len(), estimated_total: total, widened };
        self.cursor = Some(ResultCursor {
            hits: page,
            total,
            terms,
            language: profile.language(),
            widened,
        });
        Ok(outcome)
    }

    pub fn cursor(&self) -> IndexerResult<&ResultCursor> {
        self.cursor.as_ref().ok_or(IndexerError::NoResults)
    }

    fn execute(&self, plan: &QueryPlan, profile: &LanguageProfile, options: &QueryOptions) -> Execution {
        let mut execution = Execution::default();
        let Some(dict) = self.dictionaries.get(&profile.language()) else {
            return execution;
        };

        let mut matched: Option<HashMap<u64, (f32, u32)>> = None;
        let mut resolved_clauses = 0u32;

        for (g, group) in plan.groups.iter().enumerate() {
            let mut group_hits: HashMap<u64, (f32, u32)> = HashMap::new();
            let mut any_resolved = false;

            for (c, clause) in group.iter().enumerate() {
                let prefix = options.partial && plan.is_last_term(g, c);
                let Some(resolved) = self.resolve(dict, profile, clause, prefix, options) else {
                    continue;
                };
                any_resolved = true;
                resolved_clauses += 1;
                execution.terms.extend(resolved.terms());
                for (seq, score) in self.score(dict, &resolved) {
                    let slot = group_hits.entry(seq).or_default();
                    slot.0 += score;
                    slot.1 += 1;
                }
            }

            // A group made only of stopwords constrains nothing.
            if !any_resolved {
                continue;
            }
            matched = Some(match matched {
                None => group_hits,
                Some(mut acc) => {
                    acc.retain(|seq, _| group_hits.contains_key(seq));
                    for (seq, slot) in acc.iter_mut() {
                        if let Some(extra) = group_hits.get(seq) {
                            slot.0 += extra.0;
                            slot.1 += extra.1;
                        }
                    }
                    acc
                }
            });
        }

        let Some(mut matched) = matched else {
            return execution;
        };

        for clause in &plan.excluded {
            if let Some(resolved) = self.resolve(dict, profile, clause, false, options) {
                for (seq, _) in self.score(dict, &resolved) {
                    matched.remove(&seq);
                }
            }
        }

        let clauses = resolved_clauses.max(1) as f32;
        execution.hits = matched
            .into_iter()
            .map(|(seq, (score, hits))| ScoredDoc {
                seq,
                score,
                coverage: hits as f32 / clauses,
            })
            .collect();
        execution
    }

    /// Analyze a clause and expand it against the dictionary. `None` when
    /// analysis leaves nothing to look up (stopwords, punctuation).
    fn resolve(
        &self,
        dict: &TermDictionary,
        profile: &LanguageProfile,
        clause: &Clause,
        prefix: bool,
        options: &QueryOptions,
    ) -> Option<Resolved> {
        let field = clause.field;
        match &clause.kind {
            ClauseKind::Term(word) => {
                let tokens = profile.analyze(word);
                match tokens.as_slice() {
                    [] if prefix => {
                        let terms = dict.prefix_terms(&word.to_lowercase());
                        (!terms.is_empty()).then_some(Resolved::Terms { field, terms })
                    }
                    [] => None,
                    [token] => {
                        let mut terms = vec![token.term.clone()];
                        if prefix {
                            push_unique(&mut terms, dict.prefix_terms(&token.surface));
                        }
                        if options.spell_correction && !dict.contains(&token.term) {
                            if let Some(nearest) = dict.nearest_term(&token.surface) {
                                terms = vec![nearest];
                            }
                        }
                        if options.synonyms {
                            push_unique(&mut terms, self.synonym_terms(profile, &token.surface, &token.term));
                        }
                        Some(Resolved::Terms { field, terms })
                    }
                    _ => Some(phrase_from(field, &tokens)),
                }
            }
            ClauseKind::Phrase(text) => {
                let tokens = profile.analyze(text);
                match tokens.as_slice() {
                    [] => None,
                    [token] => Some(Resolved::Terms { field, terms: vec![token.term.clone()] }),
                    _ => Some(phrase_from(field, &tokens)),
                }
            }
            ClauseKind::Wildcard(stem) => {
                let lower = stem.to_lowercase();
                let mut terms = dict.prefix_terms(&lower);
                if dict.contains(&lower) {
                    push_unique(&mut terms, vec![lower]);
                }
                Some(Resolved::Terms { field, terms })
            }
            ClauseKind::Widened(word) => {
                let lower = word.to_lowercase();
                let mut terms = Vec::new();
                if let Some(term) = profile.normalize_word(word).filter(|t| dict.contains(t)) {
                    terms.push(term);
                }
                push_unique(&mut terms, dict.loose_terms(&lower));
                Some(Resolved::Terms { field, terms })
            }
        }
    }

    fn synonym_terms(&self, profile: &LanguageProfile, surface: &str, term: &str) -> Vec<String> {
        let mut out = Vec::new();
        for key in [surface, term] {
            if let Some(synonyms) = self.synonyms.get(key) {
                for synonym in synonyms {
                    out.extend(profile.analyze(synonym).into_iter().map(|t| t.term));
                }
            }
        }
        out
    }

    /// BM25 score per matching document.
    fn score(&self, dict: &TermDictionary, resolved: &Resolved) -> HashMap<u64, f32> {
        let mut scores: HashMap<u64, f32> = HashMap::new();
        let doc_count = dict.doc_count();
        let avg_len = dict.avg_length();

        match resolved {
            Resolved::Terms { field, terms } => {
                for term in terms {
                    let Some(postings) = dict.postings(term) else {
                        continue;
                    };
                    let idf = self.bm25.idf(doc_count, postings.len() as u64);
                    for (seq, field_postings) in postings {
                        let tf: f32 = field_postings
                            .iter()
                            .filter(|p| field_allowed(*field, p.field))
                            .map(|p| p.positions.len() as f32 * self.weights.weight(p.field))
                            .sum();
                        if tf > 0.0 {
                            let doc_len = self.doc_length(*seq);
                            *scores.entry(*seq).or_default() += self.bm25.score(idf, tf, doc_len, avg_len);
                        }
                    }
                }
            }
            Resolved::Phrase { field, terms } => {
                let lists: Option<Vec<(u32, &HashMap<u64, Vec<Posting>>)>> = terms
                    .iter()
                    .map(|(offset, term)| dict.postings(term).map(|p| (*offset, p)))
                    .collect();
                let Some(lists) = lists else {
                    return scores;
                };
                let idf: f32 = lists.iter().map(|(_, p)| self.bm25.idf(doc_count, p.len() as u64)).sum();
                let (_, first) = lists[0];
                for seq in first.keys() {
                    let tf = phrase_frequency(*seq, *field, &lists, &self.weights);
                    if tf > 0.0 {
                        let doc_len = self.doc_length(*seq);
                        scores.insert(*seq, self.bm25.score(idf, tf, doc_len, avg_len));
                    }
                }
            }
        }
        scores
    }

    fn doc_length(&self, seq: u64) -> f32 {
        self.docs.get(&seq).map_or(0.0, |e| e.length as f32)
    }
}

fn field_allowed(filter: Option<Field>, field: Field) -> bool {
    match filter {
        Some(wanted) => wanted == field,
        None => field.is_free_text(),
    }
}

fn push_unique(terms: &mut Vec<String>, extra: Vec<String>) {
    for term in extra {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
}

fn phrase_from(field: Option<Field>, tokens: &[crate::language::AnalyzedToken]) -> Resolved {
    let base = tokens[0].position;
    Resolved::Phrase {
        field,
        terms: tokens.iter().map(|t| (t.position - base, t.term.clone())).collect(),
    }
}

/// Weighted count of phrase occurrences in one document.
fn phrase_frequency(
    seq: u64,
    filter: Option<Field>,
    lists: &[(u32, &HashMap<u64, Vec<Posting>>)],
    weights: &FieldWeights,
) -> f32 {
    let Some(first_postings) = lists[0].1.get(&seq) else {
        return 0.0;
    };
    let mut tf = 0.0;
    for first in first_postings.iter().filter(|p| field_allowed(filter, p.field)) {
        let mut rest: Vec<(u32, &Vec<u32>)> = Vec::with_capacity(lists.len() - 1);
        for (offset, list) in &lists[1..] {
            let positions = list
                .get(&seq)
                .and_then(|ps| ps.iter().find(|p| p.field == first.field))
                .map(|p| &p.positions);
            match positions {
                Some(positions) => rest.push((*offset, positions)),
                None => break,
            }
        }
        if rest.len() != lists.len() - 1 {
            continue;
        }
        let occurrences = first
            .positions
            .iter()
            .filter(|&&start| rest.iter().all(|(offset, ps)| ps.contains(&(start + offset))))
            .count();
        tf += occurrences as f32 * weights.weight(first.field);
    }
    tf
}

/// Analyze documents in parallel, each with its own language profile.
pub(crate) fn analyze_batch(docs: Vec<IndexableDocument>, registry: &LanguageRegistry) -> Vec<IndexCandidate> {
    docs.into_par_iter()
        .map(|doc| {
            let profile = registry.profile(doc.language);
            IndexCandidate::analyze(doc, &profile)
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// INDEXER
// ─────────────────────────────────────────────────────────────────────────────

/// Every open partition of one engine.
pub struct Indexer {
    registry: Arc<LanguageRegistry>,
    weights: FieldWeights,
    partitions: RwLock<HashMap<PartitionId, Arc<Mutex<Partition>>>>,
}

impl Indexer {
    pub fn new(registry: Arc<LanguageRegistry>, weights: FieldWeights) -> Self {
        Self {
            registry,
            weights,
            partitions: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    fn partition(&self, id: PartitionId) -> IndexerResult<Arc<Mutex<Partition>>> {
        self.partitions.read().get(&id).cloned().ok_or(IndexerError::NotPrepared(id))
    }

    /// Open or create a partition. Preparing an open partition is a no-op.
    pub fn prepare(&self, id: PartitionId, location: Location) -> IndexerResult<()> {
        if let Some(existing) = self.partitions.read().get(&id) {
            let existing = existing.lock();
            if existing.location() != &location {
                debug!(partition = id, "prepare ignored for open partition at another location");
            }
            return Ok(());
        }
        let partition = Partition::open(location.clone(), &self.registry, self.weights)?;
        info!(partition = id, documents = partition.len(), location = ?location, "partition prepared");
        self.partitions
            .write()
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(partition)));
        Ok(())
    }

    /// Prepare an in-memory partition under the lowest free id above the primary.
    pub fn prepare_scratch(&self, name: &str) -> IndexerResult<PartitionId> {
        let mut partitions = self.partitions.write();
        let id = (PRIMARY_PARTITION + 1..)
            .find(|id| !partitions.contains_key(id))
            .unwrap_or(PartitionId::MAX);
        let partition = Partition::open(Location::Memory(name.to_string()), &self.registry, self.weights)?;
        partitions.insert(id, Arc::new(Mutex::new(partition)));
        debug!(partition = id, name, "scratch partition prepared");
        Ok(id)
    }

    /// Discard a partition's in-memory state. Durable storage is untouched.
    pub fn release(&self, id: PartitionId) -> IndexerResult<()> {
        match self.partitions.write().remove(&id) {
            Some(_) => {
                debug!(partition = id, "partition released");
                Ok(())
            }
            None => Err(IndexerError::NotPrepared(id)),
        }
    }

    pub fn add(&self, id: PartitionId, doc: IndexableDocument) -> IndexerResult<()> {
        self.add_batch(id, vec![doc])
    }

    /// Analyze outside the partition lock, then post everything under one
    /// lock acquisition.
    pub fn add_batch(&self, id: PartitionId, docs: Vec<IndexableDocument>) -> IndexerResult<()> {
        let partition = self.partition(id)?;
        let candidates = analyze_batch(docs, &self.registry);
        partition.lock().add(candidates);
        Ok(())
    }

    pub fn remove(&self, id: PartitionId, guids: &[Guid]) -> IndexerResult<usize> {
        Ok(self.partition(id)?.lock().remove(guids))
    }

    pub fn clear(&self, id: PartitionId) -> IndexerResult<()> {
        self.partition(id)?.lock().clear();
        Ok(())
    }

    pub fn holds_exactly(&self, id: PartitionId, guids: &[Guid]) -> IndexerResult<bool> {
        Ok(self.partition(id)?.lock().holds_exactly(guids))
    }

    pub fn add_synonym(&self, id: PartitionId, term: &str, synonym: &str) -> IndexerResult<()> {
        self.partition(id)?.lock().add_synonym(term, synonym);
        Ok(())
    }

    pub fn commit(&self, id: PartitionId) -> IndexerResult<()> {
        let partition = self.partition(id)?;
        let committed = partition.lock().commit()?;
        if committed > 0 {
            info!(partition = id, operations = committed, "partition committed");
        }
        Ok(())
    }

    pub fn compact(&self, id: PartitionId, target: Option<PathBuf>) -> IndexerResult<()> {
        let partition = self.partition(id)?;
        let mut partition = partition.lock();
        partition.compact(target)?;
        info!(partition = id, bytes = partition.durable_size(), "partition compacted");
        Ok(())
    }

    pub fn counts(&self, id: PartitionId) -> IndexerResult<PartitionCounts> {
        Ok(self.partition(id)?.lock().counts())
    }

    pub fn query(&self, id: PartitionId, profile: &LanguageProfile, options: &QueryOptions) -> IndexerResult<QueryOutcome> {
        let partition = self.partition(id)?;
        let outcome = partition.lock().query(profile, options)?;
        debug!(
            partition = id,
            query = %options.text,
            matched = outcome.matched,
            total = outcome.estimated_total,
            "query executed"
        );
        Ok(outcome)
    }

    pub fn result_guid(&self, id: PartitionId, rank: u32) -> IndexerResult<Guid> {
        let partition = self.partition(id)?;
        let partition = partition.lock();
        Ok(partition.cursor()?.hit(rank)?.guid.clone())
    }

    pub fn result_percent(&self, id: PartitionId, rank: u32) -> IndexerResult<u32> {
        let partition = self.partition(id)?;
        let partition = partition.lock();
        Ok(partition.cursor()?.hit(rank)?.percent)
    }

    /// The whole active page.
    pub fn result_hits(&self, id: PartitionId) -> IndexerResult<Vec<RankedHit>> {
        let partition = self.partition(id)?;
        let partition = partition.lock();
        Ok(partition.cursor()?.hits.clone())
    }

    /// Language and resolved terms of the active result set.
    pub fn result_terms(&self, id: PartitionId) -> IndexerResult<(Language, HashSet<String>)> {
        let partition = self.partition(id)?;
        let partition = partition.lock();
        let cursor = partition.cursor()?;
        Ok((cursor.language, cursor.terms.clone()))
    }
}
