//! Query parsing
//!
//! Grammar, loosely following the usual web-search conventions:
//! whitespace separated clauses are ANDed (`AND` is accepted and ignored),
//! `a OR b` joins neighbouring clauses, `"quoted phrase"` requires adjacency,
//! `field:term` / `field:"phrase"` restrict a clause to one field,
//! `term*` expands a prefix and `-term` excludes documents.
//!
//! The parser only produces raw words; stemming and dictionary expansion
//! happen when the plan is resolved against a partition.

use crate::models::Field;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Syntax: unbalanced quote starting at character {0}")]
    UnbalancedQuote(usize),
    #[error("Syntax: unknown field \"{0}\"")]
    UnknownField(String),
    #[error("Syntax: OR needs a clause on both sides")]
    DanglingOr,
    #[error("Syntax: a query cannot consist of exclusions only")]
    NegationOnly,
    #[error("Syntax: empty wildcard")]
    EmptyWildcard,
}

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseKind {
    /// A single word, matched by its normalized form.
    Term(String),
    /// Words that must appear adjacent and in order.
    Phrase(String),
    /// `prefix*`
    Wildcard(String),
    /// The last token of a zero-result query, matched loosely: as a prefix,
    /// as an infix or within a small edit distance of indexed words.
    Widened(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// `None` searches every free-text field.
    pub field: Option<Field>,
    pub kind: ClauseKind,
}

impl Clause {
    fn new(field: Option<Field>, kind: ClauseKind) -> Self {
        Self { field, kind }
    }
}

/// Parsed query: a conjunction of groups, each group a disjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPlan {
    pub groups: Vec<Vec<Clause>>,
    pub excluded: Vec<Clause>,
    /// Position of the final clause when it is a plain term.
    last_term: Option<(usize, usize)>,
}

impl QueryPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether `clause` is the trailing plain term (eligible for prefix matching).
    pub fn is_last_term(&self, group: usize, clause: usize) -> bool {
        self.last_term == Some((group, clause))
    }

    /// The same plan with its trailing plain term loosened. `None` when the
    /// query does not end in a plain term.
    pub fn widened(&self) -> Option<QueryPlan> {
        let (g, c) = self.last_term?;
        let mut plan = self.clone();
        let clause = plan.groups.get_mut(g)?.get_mut(c)?;
        if let ClauseKind::Term(word) = &clause.kind {
            clause.kind = ClauseKind::Widened(word.clone());
        }
        plan.last_term = None;
        Some(plan)
    }
}

/// Whether a zero-result query may be retried with its last token widened:
/// only queries without explicit wildcards or quotes qualify.
pub fn can_widen(text: &str) -> bool {
    !text.contains('*') && !text.contains('"')
}

#[derive(Debug)]
enum Item {
    Clause { negated: bool, clause: Clause },
    Or,
}

pub fn parse(text: &str) -> QueryResult<QueryPlan> {
    let items = lex(text)?;

    let mut plan = QueryPlan::default();
    let mut pending_or = false;
    let mut last_was_clause = false;

    for (index, item) in items.iter().enumerate() {
        match item {
            Item::Or => {
                if !last_was_clause || pending_or {
                    return Err(QueryError::DanglingOr);
                }
                pending_or = true;
                last_was_clause = false;
            }
            Item::Clause { negated: true, clause } => {
                if pending_or {
                    return Err(QueryError::DanglingOr);
                }
                plan.excluded.push(clause.clone());
                last_was_clause = false;
            }
            Item::Clause { negated: false, clause } => {
                if pending_or {
                    match plan.groups.last_mut() {
                        Some(group) => group.push(clause.clone()),
                        None => return Err(QueryError::DanglingOr),
                    }
                    pending_or = false;
                } else {
                    plan.groups.push(vec![clause.clone()]);
                }
                last_was_clause = true;

                let is_final = index + 1 == items.len();
                if is_final && matches!(clause.kind, ClauseKind::Term(_)) {
                    let g = plan.groups.len() - 1;
                    let c = plan.groups[g].len() - 1;
                    plan.last_term = Some((g, c));
                }
            }
        }
    }

    if pending_or {
        return Err(QueryError::DanglingOr);
    }
    if plan.groups.is_empty() && !plan.excluded.is_empty() {
        return Err(QueryError::NegationOnly);
    }
    Ok(plan)
}

fn lex(text: &str) -> QueryResult<Vec<Item>> {
    let chars: Vec<char> = text.chars().collect();
    let mut items = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        let mut negated = false;
        if chars[i] == '-' && chars.get(i + 1).is_some_and(|c| !c.is_whitespace() && *c != '-') {
            negated = true;
            i += 1;
        }

        if chars[i] == '"' {
            let (phrase, next) = read_quoted(&chars, i)?;
            i = next;
            items.push(Item::Clause { negated, clause: Clause::new(None, ClauseKind::Phrase(phrase)) });
            continue;
        }

        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '"' {
            i += 1;
        }
        let word: String = chars[start..i].iter().collect();

        if !negated && (word == "OR" || word == "||") {
            items.push(Item::Or);
            continue;
        }
        if !negated && (word == "AND" || word == "&&") {
            continue;
        }

        let (field, rest) = split_field(&word)?;

        // `field:"phrase"`: the quote starts right after the colon.
        if field.is_some() && rest.is_empty() && chars.get(i) == Some(&'"') {
            let (phrase, next) = read_quoted(&chars, i)?;
            i = next;
            items.push(Item::Clause { negated, clause: Clause::new(field, ClauseKind::Phrase(phrase)) });
            continue;
        }

        let kind = if let Some(prefix) = rest.strip_suffix('*') {
            let prefix = prefix.trim_end_matches('*');
            if prefix.is_empty() {
                return Err(QueryError::EmptyWildcard);
            }
            ClauseKind::Wildcard(prefix.to_string())
        } else {
            ClauseKind::Term(rest.to_string())
        };
        if rest.is_empty() {
            continue;
        }
        items.push(Item::Clause { negated, clause: Clause::new(field, kind) });
    }

    Ok(items)
}

/// Read a quoted run starting at `start` (which must be a quote).
/// Returns the inner text and the index just past the closing quote.
fn read_quoted(chars: &[char], start: usize) -> QueryResult<(String, usize)> {
    let mut end = start + 1;
    while end < chars.len() && chars[end] != '"' {
        end += 1;
    }
    if end >= chars.len() {
        return Err(QueryError::UnbalancedQuote(start));
    }
    Ok((chars[start + 1..end].iter().collect(), end + 1))
}

/// Split `field:rest`. Words that merely contain a colon (URLs, times) are
/// left intact; an alphabetic prefix that names no field is an error.
fn split_field(word: &str) -> QueryResult<(Option<Field>, &str)> {
    let Some((prefix, rest)) = word.split_once(':') else {
        return Ok((None, word));
    };
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphabetic()) || rest.starts_with("//") {
        return Ok((None, word));
    }
    match Field::from_prefix(prefix) {
        Some(field) => Ok((Some(field), rest)),
        None => Err(QueryError::UnknownField(prefix.to_string())),
    }
}
