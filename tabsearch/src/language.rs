//! Language profiles: tag resolution and per-language analysis chains.
//!
//! A profile pins the tokenizer, stopword list and stemmer for one language.
//! Indexing and querying must go through the same profile, so partitions keep
//! one term dictionary per canonical language name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tantivy::tokenizer::{
    Language as StemLanguage, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer,
    StopWordFilter, TextAnalyzer, TokenStream,
};

/// Tokens longer than this (in bytes) are dropped before indexing.
const MAX_TOKEN_BYTES: usize = 40;

/// Canonical languages known to the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Arabic,
    Armenian,
    Basque,
    Catalan,
    Danish,
    Dutch,
    #[default]
    English,
    Finnish,
    French,
    German,
    Hungarian,
    Indonesian,
    Irish,
    Italian,
    Lithuanian,
    Nepali,
    Norwegian,
    Portuguese,
    Romanian,
    Russian,
    Spanish,
    Swedish,
    Tamil,
    Turkish,
}

impl Language {
    pub const ALL: [Language; 24] = [
        Language::Arabic,
        Language::Armenian,
        Language::Basque,
        Language::Catalan,
        Language::Danish,
        Language::Dutch,
        Language::English,
        Language::Finnish,
        Language::French,
        Language::German,
        Language::Hungarian,
        Language::Indonesian,
        Language::Irish,
        Language::Italian,
        Language::Lithuanian,
        Language::Nepali,
        Language::Norwegian,
        Language::Portuguese,
        Language::Romanian,
        Language::Russian,
        Language::Spanish,
        Language::Swedish,
        Language::Tamil,
        Language::Turkish,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Language::Arabic => "arabic",
            Language::Armenian => "armenian",
            Language::Basque => "basque",
            Language::Catalan => "catalan",
            Language::Danish => "danish",
            Language::Dutch => "dutch",
            Language::English => "english",
            Language::Finnish => "finnish",
            Language::French => "french",
            Language::German => "german",
            Language::Hungarian => "hungarian",
            Language::Indonesian => "indonesian",
            Language::Irish => "irish",
            Language::Italian => "italian",
            Language::Lithuanian => "lithuanian",
            Language::Nepali => "nepali",
            Language::Norwegian => "norwegian",
            Language::Portuguese => "portuguese",
            Language::Romanian => "romanian",
            Language::Russian => "russian",
            Language::Spanish => "spanish",
            Language::Swedish => "swedish",
            Language::Tamil => "tamil",
            Language::Turkish => "turkish",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.name() == name)
    }

    /// Map a base tag (`en`, `pt`, `nb`) to a language.
    fn from_base_tag(tag: &str) -> Option<Self> {
        let language = match tag {
            "ar" | "fa" => Language::Arabic,
            "hy" => Language::Armenian,
            "eu" => Language::Basque,
            "ca" => Language::Catalan,
            "da" => Language::Danish,
            "nl" => Language::Dutch,
            "en" => Language::English,
            "fi" => Language::Finnish,
            "fr" => Language::French,
            "de" => Language::German,
            "hu" => Language::Hungarian,
            "id" => Language::Indonesian,
            "ga" => Language::Irish,
            "it" => Language::Italian,
            "lt" => Language::Lithuanian,
            "ne" => Language::Nepali,
            "no" | "nn" | "nb" => Language::Norwegian,
            "pt" => Language::Portuguese,
            "ro" => Language::Romanian,
            "ru" => Language::Russian,
            "es" => Language::Spanish,
            "sv" => Language::Swedish,
            "ta" => Language::Tamil,
            "tr" => Language::Turkish,
            _ => return None,
        };
        Some(language)
    }

    /// Resolve a BCP-47-like tag or canonical name. Never fails: unknown
    /// input falls back to English.
    pub fn resolve(tag: &str) -> Self {
        let lowered = tag.trim().to_lowercase();
        if let Some(language) = Self::from_name(&lowered) {
            return language;
        }
        let base = lowered.split(['-', '_']).next().unwrap_or_default();
        Self::from_base_tag(base).unwrap_or(Language::English)
    }

    /// Snowball stemmer for this language, where one exists.
    fn stemmer(self) -> Option<StemLanguage> {
        match self {
            Language::Arabic => Some(StemLanguage::Arabic),
            Language::Danish => Some(StemLanguage::Danish),
            Language::Dutch => Some(StemLanguage::Dutch),
            Language::English => Some(StemLanguage::English),
            Language::Finnish => Some(StemLanguage::Finnish),
            Language::French => Some(StemLanguage::French),
            Language::German => Some(StemLanguage::German),
            Language::Hungarian => Some(StemLanguage::Hungarian),
            Language::Italian => Some(StemLanguage::Italian),
            Language::Norwegian => Some(StemLanguage::Norwegian),
            Language::Portuguese => Some(StemLanguage::Portuguese),
            Language::Romanian => Some(StemLanguage::Romanian),
            Language::Russian => Some(StemLanguage::Russian),
            Language::Spanish => Some(StemLanguage::Spanish),
            Language::Swedish => Some(StemLanguage::Swedish),
            Language::Tamil => Some(StemLanguage::Tamil),
            Language::Turkish => Some(StemLanguage::Turkish),
            Language::Armenian
            | Language::Basque
            | Language::Catalan
            | Language::Indonesian
            | Language::Irish
            | Language::Lithuanian
            | Language::Nepali => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One analyzed token. Offsets are byte offsets into the analyzed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedToken {
    /// Normalized (case-folded, stemmed) form used as the dictionary key.
    pub term: String,
    /// Case-folded surface form as it appeared in the text.
    pub surface: String,
    pub position: u32,
    pub byte_start: usize,
    pub byte_end: usize,
}

/// Analysis chain for one language.
#[derive(Clone)]
pub struct LanguageProfile {
    language: Language,
    analyzer: TextAnalyzer,
}

impl std::fmt::Debug for LanguageProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageProfile").field("language", &self.language).finish()
    }
}

impl LanguageProfile {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            analyzer: build_analyzer(language),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Run the full chain over `text`.
    pub fn analyze(&self, text: &str) -> Vec<AnalyzedToken> {
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while let Some(token) = stream.next() {
            let surface = text
                .get(token.offset_from..token.offset_to)
                .map(str::to_lowercase)
                .unwrap_or_else(|| token.text.clone());
            tokens.push(AnalyzedToken {
                term: token.text.clone(),
                surface,
                position: token.position as u32,
                byte_start: token.offset_from,
                byte_end: token.offset_to,
            });
        }
        tokens
    }

    /// Normalize a single word; `None` when the chain drops it (stopword,
    /// punctuation only, overlong).
    pub fn normalize_word(&self, word: &str) -> Option<String> {
        self.analyze(word).into_iter().next().map(|t| t.term)
    }
}

fn build_analyzer(language: Language) -> TextAnalyzer {
    let stemmer = language.stemmer();
    let stopwords = if has_stopwords(language) {
        stemmer.and_then(StopWordFilter::new)
    } else {
        None
    };

    // Each arm builds a distinct filter stack; `build()` erases the type.
    match (stopwords, stemmer) {
        (Some(stop), Some(stem)) => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
            .filter(LowerCaser)
            .filter(stop)
            .filter(Stemmer::new(stem))
            .build(),
        (None, Some(stem)) => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
            .filter(LowerCaser)
            .filter(Stemmer::new(stem))
            .build(),
        (Some(stop), None) => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
            .filter(LowerCaser)
            .filter(stop)
            .build(),
        (None, None) => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
            .filter(LowerCaser)
            .build(),
    }
}

/// Languages with a bundled stopword list.
fn has_stopwords(language: Language) -> bool {
    matches!(
        language,
        Language::Danish
            | Language::Dutch
            | Language::English
            | Language::Finnish
            | Language::French
            | Language::German
            | Language::Hungarian
            | Language::Italian
            | Language::Norwegian
            | Language::Portuguese
            | Language::Russian
            | Language::Spanish
            | Language::Swedish
    )
}

/// Registry of prebuilt profiles, one per canonical language.
pub struct LanguageRegistry {
    profiles: HashMap<Language, LanguageProfile>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let profiles = Language::ALL
            .iter()
            .map(|&l| (l, LanguageProfile::new(l)))
            .collect();
        Self { profiles }
    }

    /// Resolve a tag to its profile; unknown tags get the English profile.
    pub fn resolve(&self, tag: &str) -> LanguageProfile {
        self.profile(Language::resolve(tag))
    }

    pub fn profile(&self, language: Language) -> LanguageProfile {
        self.profiles
            .get(&language)
            .cloned()
            .unwrap_or_else(|| LanguageProfile::new(language))
    }

    /// Canonical names of every supported language.
    pub fn languages(&self) -> Vec<String> {
        Language::ALL.iter().map(|l| l.name().to_string()).collect()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
