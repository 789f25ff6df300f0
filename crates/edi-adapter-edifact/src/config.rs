//! Reader configuration

use crate::{Error, Result};
use edi_schema::Delimiters;
use serde::Deserialize;
use std::path::Path;

/// Default bound on nested scopes and segment groups
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Configuration for one interchange parser
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Decode and check field values against the mapping model (default: false)
    pub validate: bool,
    /// Turn validation and control count diagnostics into errors (default: false)
    pub strict: bool,
    /// Skip CR/LF between and inside segments (default: false)
    pub ignore_newlines: bool,
    /// Suppress elements for empty values (default: false)
    pub ignore_empty_nodes: bool,
    /// Emit newline and tab indentation as text events (default: false)
    pub indent: bool,
    /// Maximum nesting of envelope scopes and segment groups (default: 32)
    pub max_depth: usize,
    /// Delimiters in effect before any UNA (default: UN/EDIFACT)
    pub delimiters: Delimiters,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            validate: false,
            strict: false,
            ignore_newlines: false,
            ignore_empty_nodes: false,
            indent: false,
            max_depth: DEFAULT_MAX_DEPTH,
            delimiters: Delimiters::UN_EDIFACT,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file, YAML for `.yaml`/`.yml`, JSON otherwise
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    #[must_use]
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn ignore_newlines(mut self, ignore: bool) -> Self {
        self.ignore_newlines = ignore;
        self
    }

    #[must_use]
    pub fn ignore_empty_nodes(mut self, ignore: bool) -> Self {
        self.ignore_empty_nodes = ignore;
        self
    }

    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert!(!config.validate);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.delimiters, Delimiters::UN_EDIFACT);
    }

    #[test]
    fn test_from_yaml() {
        let config = ReaderConfig::from_yaml_str(
            "validate: true\nindent: true\ndelimiters:\n  segment: \"~\"\n  field: \"*\"\n",
        )
        .unwrap();
        assert!(config.validate);
        assert!(config.indent);
        assert!(!config.strict);
        assert_eq!(config.delimiters.segment(), '~');
        assert_eq!(config.delimiters.field(), '*');
        assert_eq!(config.delimiters.component(), ':');
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reader.json");
        std::fs::write(&path, r#"{"strict": true, "max_depth": 8}"#).unwrap();

        let config = ReaderConfig::from_file(&path).unwrap();
        assert!(config.strict);
        assert_eq!(config.max_depth, 8);
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(matches!(
            ReaderConfig::from_json_str(r#"{"validation": true}"#),
            Err(Error::Config(_))
        ));
    }
}
