//! Index candidate: a document analyzed ahead of insertion.
//!
//! Analysis is the expensive part of indexing and needs no partition state,
//! so batches build candidates in parallel and only take the partition lock
//! to merge the finished postings.

use crate::dictionary::Posting;
use crate::language::LanguageProfile;
use crate::models::IndexableDocument;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct IndexCandidate {
    pub doc: IndexableDocument,
    /// Normalized term → one posting per field it occurs in.
    pub postings: HashMap<String, Vec<Posting>>,
    /// Surface form → normalized term.
    pub surfaces: HashMap<String, String>,
    /// Token count over the free-text fields.
    pub length: u32,
}

impl IndexCandidate {
    pub fn analyze(doc: IndexableDocument, profile: &LanguageProfile) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut surfaces = HashMap::new();
        let mut length = 0u32;

        for (field, text) in &doc.fields {
            let tokens = profile.analyze(text);
            if field.is_free_text() {
                length += tokens.len() as u32;
            }
            for token in tokens {
                let field_postings = postings.entry(token.term.clone()).or_default();
                match field_postings.iter_mut().find(|p| p.field == *field) {
                    Some(posting) => posting.positions.push(token.position),
                    None => field_postings.push(Posting {
                        field: *field,
                        positions: vec![token.position],
                    }),
                }
                surfaces.entry(token.surface).or_insert(token.term);
            }
        }

        Self { doc, postings, surfaces, length }
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}
