//! Per-language term dictionary of a partition.
//!
//! Maps normalized terms to postings keyed by the document's insertion
//! sequence, and keeps the surface vocabulary (unstemmed, case-folded words)
//! used to expand wildcards, partial terms and widened tokens.

use crate::candidate::IndexCandidate;
use crate::models::Field;
use crate::ranking::{edit_distance_bounded, loose_match, max_edit_distance, LooseMatch};
use std::collections::{BTreeMap, HashMap};

/// Upper bound on the number of terms one expanded clause may stand for.
pub const MAX_EXPANSIONS: usize = 128;

/// Positions of one term within one field of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub field: Field,
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone)]
struct SurfaceEntry {
    term: String,
    /// Number of live documents containing this surface form.
    docs: u32,
}

#[derive(Debug, Default)]
pub struct TermDictionary {
    postings: HashMap<String, HashMap<u64, Vec<Posting>>>,
    surface: BTreeMap<String, SurfaceEntry>,
    doc_count: u64,
    total_length: u64,
}

impl TermDictionary {
    pub fn insert(&mut self, seq: u64, candidate: &IndexCandidate) {
        for (term, postings) in &candidate.postings {
            self.postings.entry(term.clone()).or_default().insert(seq, postings.clone());
        }
        for (surface, term) in &candidate.surfaces {
            self.surface
                .entry(surface.clone())
                .and_modify(|e| e.docs += 1)
                .or_insert_with(|| SurfaceEntry { term: term.clone(), docs: 1 });
        }
        self.doc_count += 1;
        self.total_length += u64::from(candidate.length);
    }

    /// Drop a document's postings. `terms` and `surfaces` are the keys it
    /// was inserted under.
    pub fn remove<'a>(
        &mut self,
        seq: u64,
        terms: impl IntoIterator<Item = &'a String>,
        surfaces: impl IntoIterator<Item = &'a String>,
        length: u32,
    ) {
        for term in terms {
            if let Some(docs) = self.postings.get_mut(term) {
                docs.remove(&seq);
                if docs.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        for surface in surfaces {
            if let Some(entry) = self.surface.get_mut(surface) {
                entry.docs = entry.docs.saturating_sub(1);
                if entry.docs == 0 {
                    self.surface.remove(surface);
                }
            }
        }
        self.doc_count = self.doc_count.saturating_sub(1);
        self.total_length = self.total_length.saturating_sub(u64::from(length));
    }

    pub fn doc_count(&self) -> u64 {
        self.doc_count
    }

    pub fn term_count(&self) -> u64 {
        self.postings.len() as u64
    }

    pub fn avg_length(&self) -> f32 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.total_length as f32 / self.doc_count as f32
    }

    pub fn contains(&self, term: &str) -> bool {
        self.postings.contains_key(term)
    }

    pub fn doc_freq(&self, term: &str) -> u64 {
        self.postings.get(term).map_or(0, |docs| docs.len() as u64)
    }

    pub fn postings(&self, term: &str) -> Option<&HashMap<u64, Vec<Posting>>> {
        self.postings.get(term)
    }

    /// Terms of every surface word starting with `prefix`.
    pub fn prefix_terms(&self, prefix: &str) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for (surface, entry) in self.surface.range(prefix.to_string()..) {
            if !surface.starts_with(prefix) || terms.len() >= MAX_EXPANSIONS {
                break;
            }
            if !terms.contains(&entry.term) {
                terms.push(entry.term.clone());
            }
        }
        terms
    }

    /// Terms of surface words loosely matching `word`, closest matches first.
    pub fn loose_terms(&self, word: &str) -> Vec<String> {
        let mut matches: Vec<(LooseMatch, &str, &str)> = self
            .surface
            .iter()
            .filter_map(|(surface, entry)| {
                loose_match(word, surface).map(|m| (m, surface.as_str(), entry.term.as_str()))
            })
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(b.1)));

        let mut terms: Vec<String> = Vec::new();
        for (_, _, term) in matches {
            if terms.len() >= MAX_EXPANSIONS {
                break;
            }
            if !terms.iter().any(|t| t == term) {
                terms.push(term.to_string());
            }
        }
        terms
    }

    /// The indexed term whose surface form is closest to `word`, within the
    /// length-graduated edit distance. Ties go to the more frequent word.
    pub fn nearest_term(&self, word: &str) -> Option<String> {
        let max = max_edit_distance(word.chars().count());
        if max == 0 {
            return None;
        }
        self.surface
            .iter()
            .filter_map(|(surface, entry)| {
                edit_distance_bounded(word, surface, max).map(|d| (d, std::cmp::Reverse(entry.docs), surface, entry))
            })
            .min_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)))
            .map(|(_, _, _, entry)| entry.term.clone())
    }
}
