//! Engine configuration
//!
//! TOML on disk, every field optional (missing keys take defaults), with
//! `TABSEARCH_*` environment variables applied on top.

use crate::models::FieldWeights;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub const ENV_PREFIX: &str = "TABSEARCH_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, uniffi::Record)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite file of the document store; in-memory when unset.
    pub database_path: Option<String>,
    /// Directory of the primary partition; in-memory when unset.
    pub index_dir: Option<String>,
    /// Where the source table is persisted between indexing passes.
    pub sources_path: Option<String>,
    pub default_language: String,
    /// Page size of a search.
    pub search_size: u32,
    /// Target length of snippets, and minimum size of deep-search chunks.
    pub snippet_size: u32,
    /// Bodies longer than this many bytes are truncated before indexing.
    pub max_content_length: u64,
    /// Time budget of collectors, after which they hand over placeholders.
    pub fetch_timeout_ms: u64,
    pub title_weight: f32,
    pub partial: bool,
    pub spell_correction: bool,
    pub synonyms: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            index_dir: None,
            sources_path: None,
            default_language: "english".to_string(),
            search_size: 30,
            snippet_size: 300,
            max_content_length: 100 * 1024,
            fetch_timeout_ms: 10_000,
            title_weight: 3.0,
            partial: true,
            spell_correction: false,
            synonyms: false,
        }
    }
}

impl EngineConfig {
    /// Configuration with every store under one directory.
    pub fn in_dir(dir: &Path) -> Self {
        let path = |name: &str| Some(dir.join(name).to_string_lossy().into_owned());
        Self {
            database_path: path("documents.sqlite"),
            index_dir: path("index"),
            sources_path: path("sources.json"),
            ..Self::default()
        }
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `TABSEARCH_*` variables from the process environment.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by the upper-cased field name
    /// with the `TABSEARCH_` prefix.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = get("DATABASE_PATH") {
            self.database_path = non_empty(v);
        }
        if let Some(v) = get("INDEX_DIR") {
            self.index_dir = non_empty(v);
        }
        if let Some(v) = get("SOURCES_PATH") {
            self.sources_path = non_empty(v);
        }
        if let Some(v) = get("DEFAULT_LANGUAGE") {
            self.default_language = v;
        }
        if let Some(v) = get("SEARCH_SIZE") {
            self.search_size = parse_value("SEARCH_SIZE", &v)?;
        }
        if let Some(v) = get("SNIPPET_SIZE") {
            self.snippet_size = parse_value("SNIPPET_SIZE", &v)?;
        }
        if let Some(v) = get("MAX_CONTENT_LENGTH") {
            self.max_content_length = parse_value("MAX_CONTENT_LENGTH", &v)?;
        }
        if let Some(v) = get("FETCH_TIMEOUT_MS") {
            self.fetch_timeout_ms = parse_value("FETCH_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("TITLE_WEIGHT") {
            self.title_weight = parse_value("TITLE_WEIGHT", &v)?;
        }
        if let Some(v) = get("PARTIAL") {
            self.partial = parse_flag("PARTIAL", &v)?;
        }
        if let Some(v) = get("SPELL_CORRECTION") {
            self.spell_correction = parse_flag("SPELL_CORRECTION", &v)?;
        }
        if let Some(v) = get("SYNONYMS") {
            self.synonyms = parse_flag("SYNONYMS", &v)?;
        }
        Ok(())
    }

    pub fn field_weights(&self) -> FieldWeights {
        FieldWeights { title: self.title_weight }
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path.as_ref().map(PathBuf::from)
    }

    pub fn index_dir(&self) -> Option<PathBuf> {
        self.index_dir.as_ref().map(PathBuf::from)
    }

    pub fn sources_path(&self) -> Option<PathBuf> {
        self.sources_path.as_ref().map(PathBuf::from)
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{key}"),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: format!("{ENV_PREFIX}{key}"),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.search_size, 30);
        assert_eq!(config.snippet_size, 300);
        assert_eq!(config.max_content_length, 102_400);
        assert_eq!(config.field_weights().title, 3.0);
        assert!(config.partial);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("search_size = 10\nsynonyms = true\n").unwrap();
        assert_eq!(config.search_size, 10);
        assert!(config.synonyms);
        assert_eq!(config.snippet_size, 300);
    }

    #[test]
    fn test_invalid_toml() {
        let err = EngineConfig::from_toml_str("search_size = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("tabsearch.toml");
        assert_eq!(EngineConfig::load(&path).unwrap(), EngineConfig::default());

        let mut config = EngineConfig::in_dir(dir.path());
        config.default_language = "german".into();
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TABSEARCH_SEARCH_SIZE", "50"),
            ("TABSEARCH_SPELL_CORRECTION", "yes"),
            ("TABSEARCH_INDEX_DIR", "/tmp/index"),
            ("TABSEARCH_DATABASE_PATH", ""),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig { database_path: Some("db.sqlite".into()), ..Default::default() };
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.search_size, 50);
        assert!(config.spell_correction);
        assert_eq!(config.index_dir.as_deref(), Some("/tmp/index"));
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_invalid_override() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(|k| (k == "TABSEARCH_PARTIAL").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("TABSEARCH_PARTIAL"));
    }
}
