//! Core data models for tabsearch
//!
//! `DocumentRecord` is the validated, defaulted form of a `DocumentInput`.
//! Defaults are applied once at construction so no read site has to guess.

use crate::content_detection;
use crate::interface::{DocumentInput, HiddenMeta, StoredDocument};
use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// IDENTIFIERS
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque document identifier, unique within a partition while live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Guid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Guid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FIELDS
// ─────────────────────────────────────────────────────────────────────────────

/// Indexed document fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Body,
    Url,
    Hostname,
    Filename,
    Keywords,
    Description,
    Mime,
    Date,
    Language,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Title,
        Field::Body,
        Field::Url,
        Field::Hostname,
        Field::Filename,
        Field::Keywords,
        Field::Description,
        Field::Mime,
        Field::Date,
        Field::Language,
    ];

    /// Fields searched by unqualified query terms.
    pub fn is_free_text(self) -> bool {
        matches!(
            self,
            Field::Title | Field::Body | Field::Url | Field::Keywords | Field::Description
        )
    }

    /// Field from a query prefix such as `title:` or `site:`.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        let field = match prefix.to_lowercase().as_str() {
            "title" => Field::Title,
            "body" => Field::Body,
            "url" => Field::Url,
            "host" | "hostname" | "site" => Field::Hostname,
            "filename" | "file" => Field::Filename,
            "keyword" | "keywords" => Field::Keywords,
            "description" => Field::Description,
            "mime" | "type" => Field::Mime,
            "date" => Field::Date,
            "lang" | "language" => Field::Language,
            _ => return None,
        };
        Some(field)
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Body => "body",
            Field::Url => "url",
            Field::Hostname => "hostname",
            Field::Filename => "filename",
            Field::Keywords => "keywords",
            Field::Description => "description",
            Field::Mime => "mime",
            Field::Date => "date",
            Field::Language => "language",
        }
    }
}

/// Per-field multipliers applied to term frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldWeights {
    pub title: f32,
}

impl FieldWeights {
    pub fn weight(&self, field: Field) -> f32 {
        match field {
            Field::Title => self.title,
            _ => 1.0,
        }
    }
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self { title: 3.0 }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DOCUMENTS
// ─────────────────────────────────────────────────────────────────────────────

/// A document ready for storage and indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub guid: Option<Guid>,
    pub language: Language,
    pub url: String,
    pub hostname: String,
    pub filename: String,
    pub title: String,
    pub body: String,
    pub keywords: String,
    pub description: String,
    pub mime: String,
    pub date: String,
    pub hidden: HiddenMeta,
}

impl DocumentRecord {
    /// Build a record from collector input, deriving hostname and filename,
    /// normalizing keywords and clipping the body to `max_content_length` bytes.
    pub fn new(input: DocumentInput, mut hidden: HiddenMeta, max_content_length: usize) -> Self {
        let (hostname, filename) = content_detection::url_parts(&input.url);
        let date = input
            .date
            .filter(|d| content_detection::is_date_stamp(d))
            .unwrap_or_else(content_detection::today_stamp);
        let mime = if input.mime.trim().is_empty() {
            "text/html".to_string()
        } else {
            input.mime.trim().to_lowercase()
        };
        if hidden.timestamp.is_none() {
            hidden.timestamp = Some(chrono::Utc::now().timestamp_millis());
        }
        let body = content_detection::truncate_body(&input.body, max_content_length).to_string();

        Self {
            guid: input.guid.filter(|g| !g.is_empty()).map(Guid::from),
            language: Language::resolve(&input.lang),
            url: input.url,
            hostname,
            filename,
            title: input.title,
            body,
            keywords: content_detection::normalize_keywords(&input.keywords),
            description: input.description,
            mime,
            date,
            hidden,
        }
    }

    /// Minimal document indexed when a collector gives up on a source:
    /// only the URL and title are known.
    pub fn placeholder(url: &str, title: &str, hidden: HiddenMeta) -> Self {
        let input = DocumentInput {
            url: url.to_string(),
            title: title.to_string(),
            lang: Language::English.name().to_string(),
            ..Default::default()
        };
        let hidden = HiddenMeta { top: true, frame_id: Some(0), ..hidden };
        Self::new(input, hidden, usize::MAX)
    }

    /// A record with nothing to index is rejected before it reaches the store.
    pub fn is_empty(&self) -> bool {
        self.url.trim().is_empty() && self.title.trim().is_empty() && self.body.trim().is_empty()
    }

    /// Text of every indexed field, skipping empty ones.
    pub fn indexed_fields(&self) -> Vec<(Field, String)> {
        Field::ALL
            .iter()
            .map(|&field| (field, self.field_text(field)))
            .filter(|(_, text)| !text.trim().is_empty())
            .collect()
    }

    fn field_text(&self, field: Field) -> String {
        match field {
            Field::Title => self.title.clone(),
            Field::Body => self.body.clone(),
            Field::Url => self.url.clone(),
            Field::Hostname => self.hostname.clone(),
            Field::Filename => self.filename.clone(),
            Field::Keywords => self.keywords.replace(',', " "),
            Field::Description => self.description.clone(),
            Field::Mime => self.mime.clone(),
            Field::Date => self.date.clone(),
            Field::Language => self.language.name().to_string(),
        }
    }

    /// The indexable form under an assigned guid.
    pub fn to_indexable(&self, guid: Guid) -> IndexableDocument {
        IndexableDocument {
            guid,
            language: self.language,
            fields: self.indexed_fields(),
        }
    }

    pub fn into_stored(self, guid: Guid) -> StoredDocument {
        StoredDocument {
            guid: guid.into_string(),
            language: self.language,
            url: self.url,
            hostname: self.hostname,
            filename: self.filename,
            title: self.title,
            body: self.body,
            keywords: self.keywords,
            description: self.description,
            mime: self.mime,
            date: self.date,
            hidden: self.hidden,
        }
    }
}

/// What the inverted index keeps about a document: the text of each field
/// under its guid and language. Also the unit written to the partition journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexableDocument {
    pub guid: Guid,
    pub language: Language,
    pub fields: Vec<(Field, String)>,
}

impl IndexableDocument {
    pub fn new(guid: impl Into<Guid>, language: Language, fields: Vec<(Field, String)>) -> Self {
        Self { guid: guid.into(), language, fields }
    }

    pub fn field(&self, field: Field) -> Option<&str> {
        self.fields.iter().find(|(f, _)| *f == field).map(|(_, text)| text.as_str())
    }
}

impl From<&StoredDocument> for IndexableDocument {
    fn from(doc: &StoredDocument) -> Self {
        let record = DocumentRecord {
            guid: None,
            language: doc.language,
            url: doc.url.clone(),
            hostname: doc.hostname.clone(),
            filename: doc.filename.clone(),
            title: doc.title.clone(),
            body: doc.body.clone(),
            keywords: doc.keywords.clone(),
            description: doc.description.clone(),
            mime: doc.mime.clone(),
            date: doc.date.clone(),
            hidden: doc.hidden.clone(),
        };
        record.to_indexable(Guid::new(doc.guid.clone()))
    }
}
