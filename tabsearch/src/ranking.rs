//! Relevance scoring
//!
//! BM25 over field-weighted term frequencies, percent normalization for
//! display, deterministic ordering, and the bounded edit distance used by
//! spelling correction and zero-result widening.

use std::cmp::Ordering;

/// BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25 {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25 {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl Bm25 {
    /// Inverse document frequency with the +1 inside the log, so terms
    /// present in every document still contribute a small positive weight.
    pub fn idf(&self, doc_count: u64, doc_freq: u64) -> f32 {
        let n = doc_count as f32;
        let df = doc_freq.min(doc_count) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Saturated term-frequency component.
    pub fn score(&self, idf: f32, tf: f32, doc_len: f32, avg_len: f32) -> f32 {
        if tf <= 0.0 {
            return 0.0;
        }
        let avg_len = if avg_len > 0.0 { avg_len } else { 1.0 };
        let norm = self.k1 * (1.0 - self.b + self.b * doc_len / avg_len);
        idf * tf * (self.k1 + 1.0) / (tf + norm)
    }
}

/// A scored candidate before pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDoc {
    /// Insertion sequence within the partition; lower is older.
    pub seq: u64,
    pub score: f32,
    /// Fraction of query clauses this document matched, in `0.0..=1.0`.
    pub coverage: f32,
}

/// Sort candidates by score (best first when `descending`), breaking ties
/// by insertion order in both directions.
pub fn order_hits(hits: &mut [ScoredDoc], descending: bool) {
    hits.sort_by(|a, b| {
        let by_score = if descending {
            b.score.partial_cmp(&a.score)
        } else {
            a.score.partial_cmp(&b.score)
        };
        by_score.unwrap_or(Ordering::Equal).then(a.seq.cmp(&b.seq))
    });
}

/// Display percent relative to the best score of the result set, scaled by
/// clause coverage. Every hit gets at least 1.
pub fn percent(score: f32, top_score: f32, coverage: f32) -> u32 {
    let relative = if top_score > 0.0 { score / top_score } else { 1.0 };
    let value = (100.0 * relative * coverage.clamp(0.0, 1.0)).round();
    (value as u32).clamp(1, 100)
}

/// Max edit distance allowed for a word of `word_len` characters.
pub(crate) fn max_edit_distance(word_len: usize) -> u8 {
    if word_len < 5 {
        0
    } else if word_len <= 8 {
        1
    } else {
        2
    }
}

/// Optimal string alignment distance (Damerau-Levenshtein without repeated
/// edits of a substring), abandoned as soon as every cell of a row exceeds
/// `max_dist`.
pub fn edit_distance_bounded(a: &str, b: &str, max_dist: u8) -> Option<u8> {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();
    let max_d = max_dist as usize;

    if m.abs_diff(n) > max_d {
        return None;
    }

    let mut prev2 = vec![0usize; n + 1];
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        let mut row_min = curr[0];

        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);

            if i >= 2 && j >= 2 && a_chars[i - 1] == b_chars[j - 2] && a_chars[i - 2] == b_chars[j - 1] {
                curr[j] = curr[j].min(prev2[j - 2] + 1);
            }

            row_min = row_min.min(curr[j]);
        }

        if row_min > max_d {
            return None;
        }

        std::mem::swap(&mut prev2, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }

    let result = prev[n];
    (result <= max_d).then_some(result as u8)
}

/// How a loosened query word relates to an indexed word, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LooseMatch {
    Prefix,
    Infix,
    Fuzzy(u8),
}

/// Match `query` against `word` (both case-folded) as a prefix, an infix,
/// or within the length-graduated edit distance of the whole word or of
/// the word's leading characters.
pub fn loose_match(query: &str, word: &str) -> Option<LooseMatch> {
    if word.starts_with(query) {
        return Some(LooseMatch::Prefix);
    }
    if word.contains(query) {
        return Some(LooseMatch::Infix);
    }
    let query_len = query.chars().count();
    let max = max_edit_distance(query_len);
    if max == 0 {
        return None;
    }
    if let Some(d) = edit_distance_bounded(query, word, max) {
        return Some(LooseMatch::Fuzzy(d));
    }
    let head: String = word.chars().take(query_len).collect();
    if head.chars().count() == query_len {
        if let Some(d) = edit_distance_bounded(query, &head, max) {
            return Some(LooseMatch::Fuzzy(d));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── edit_distance_bounded tests ──────────────────────────────

    #[test]
    fn test_edit_distance_exact() {
        assert_eq!(edit_distance_bounded("hello", "hello", 2), Some(0));
    }

    #[test]
    fn test_edit_distance_insertion() {
        assert_eq!(edit_distance_bounded("progamming", "programming", 2), Some(1));
    }

    #[test]
    fn test_edit_distance_transposition_counts_once() {
        assert_eq!(edit_distance_bounded("teh", "the", 1), Some(1));
    }

    #[test]
    fn test_edit_distance_exceeds_bound() {
        assert_eq!(edit_distance_bounded("kitten", "sitting", 2), None);
        assert_eq!(edit_distance_bounded("a", "abcd", 2), None);
    }

    #[test]
    fn test_max_edit_distance_graduated() {
        assert_eq!(max_edit_distance(4), 0);
        assert_eq!(max_edit_distance(5), 1);
        assert_eq!(max_edit_distance(8), 1);
        assert_eq!(max_edit_distance(9), 2);
    }

    // ── loose_match tests ────────────────────────────────────────

    #[test]
    fn test_loose_match_kinds() {
        assert_eq!(loose_match("prog", "programming"), Some(LooseMatch::Prefix));
        assert_eq!(loose_match("gram", "programming"), Some(LooseMatch::Infix));
        assert_eq!(loose_match("progamming", "programming"), Some(LooseMatch::Fuzzy(1)));
        assert_eq!(loose_match("progrem", "programming"), Some(LooseMatch::Fuzzy(1)));
        assert_eq!(loose_match("rust", "trust"), Some(LooseMatch::Infix));
        assert_eq!(loose_match("rsut", "rust"), None);
    }

    // ── scoring tests ────────────────────────────────────────────

    #[test]
    fn test_idf_rarer_terms_weigh_more() {
        let bm25 = Bm25::default();
        assert!(bm25.idf(100, 1) > bm25.idf(100, 50));
        assert!(bm25.idf(100, 100) > 0.0);
    }

    #[test]
    fn test_tf_saturates() {
        let bm25 = Bm25::default();
        let one = bm25.score(1.0, 1.0, 10.0, 10.0);
        let three = bm25.score(1.0, 3.0, 10.0, 10.0);
        let thirty = bm25.score(1.0, 30.0, 10.0, 10.0);
        assert!(three > one);
        assert!(thirty - three < three - one);
        assert!(thirty < bm25.k1 + 1.0);
    }

    #[test]
    fn test_longer_documents_score_lower() {
        let bm25 = Bm25::default();
        assert!(bm25.score(1.0, 1.0, 5.0, 10.0) > bm25.score(1.0, 1.0, 50.0, 10.0));
    }

    #[test]
    fn test_order_hits_ties_by_insertion() {
        let mut hits = vec![
            ScoredDoc { seq: 3, score: 1.0, coverage: 1.0 },
            ScoredDoc { seq: 1, score: 1.0, coverage: 1.0 },
            ScoredDoc { seq: 2, score: 2.0, coverage: 1.0 },
        ];
        order_hits(&mut hits, true);
        assert_eq!(hits.iter().map(|h| h.seq).collect::<Vec<_>>(), vec![2, 1, 3]);
        order_hits(&mut hits, false);
        assert_eq!(hits.iter().map(|h| h.seq).collect::<Vec<_>>(), vec![1, 3, 2]);
    }

    #[test]
    fn test_percent_bounds() {
        assert_eq!(percent(2.0, 2.0, 1.0), 100);
        assert_eq!(percent(1.0, 2.0, 1.0), 50);
        assert_eq!(percent(2.0, 2.0, 0.5), 50);
        assert_eq!(percent(0.0001, 2.0, 1.0), 1);
        assert_eq!(percent(0.0, 0.0, 1.0), 100);
    }
}
