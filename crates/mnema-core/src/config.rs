//! Configuration management

use crate::error::{MnemaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Path of the SQLite store (defaults to the platform cache dir)
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Watched directory roots, scanned on every reindex
    #[serde(default)]
    pub roots: Vec<WatchedRoot>,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingServiceConfig,
}

/// One watched directory and the labeling rules that apply beneath it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedRoot {
    /// Directory to scan for markdown files
    pub path: PathBuf,

    /// Kind of content rooted here, drives label derivation
    #[serde(default)]
    pub kind: RootKind,
}

impl WatchedRoot {
    pub fn new(path: impl Into<PathBuf>, kind: RootKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Last path component, used as the stored-path prefix
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.kind.as_str().to_string())
    }
}

/// Kind of a watched root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    /// Requirement specifications, one domain per subdirectory
    Specs,
    /// Archived change artifacts (delta specs, proposals, tasks, ...)
    Archive,
    /// Knowledge notes, one category per subdirectory
    Knowledge,
    /// Any other watched documentation
    #[default]
    Docs,
}

impl RootKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootKind::Specs => "specs",
            RootKind::Archive => "archive",
            RootKind::Knowledge => "knowledge",
            RootKind::Docs => "docs",
        }
    }
}

/// Embedding service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingServiceConfig {
    /// Base URL of the embeddings service
    pub url: String,

    /// Model name for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimensions (auto-detected from the service if not specified)
    #[serde(default)]
    pub dimensions: Option<usize>,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingServiceConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("MNEMA_EMBEDDING_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            model: default_embedding_model(),
            dimensions: std::env::var("MNEMA_EMBEDDING_DIMS")
                .ok()
                .and_then(|s| s.parse().ok()),
            api_key: std::env::var("MNEMA_EMBEDDING_API_KEY").ok(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_embedding_model() -> String {
    std::env::var("MNEMA_EMBEDDING_MODEL")
        .unwrap_or_else(|_| "sentence-transformers/all-MiniLM-L6-v2".to_string())
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load config from the default path, falling back to defaults when the
    /// file does not exist
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific YAML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yaml")
    }

    fn validate(&self) -> Result<()> {
        for root in &self.roots {
            if root.path.as_os_str().is_empty() {
                return Err(MnemaError::Config("watched root with empty path".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roots() {
        let yaml = r#"
roots:
  - path: /work/specs
    kind: specs
  - path: /work/archive
    kind: archive
  - path: /work/notes
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.roots.len(), 3);
        assert_eq!(config.roots[0].kind, RootKind::Specs);
        assert_eq!(config.roots[2].kind, RootKind::Docs);
        assert_eq!(config.roots[0].name(), "specs");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.roots.is_empty());
    }
}
