//! Configuration management for ragprompt
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.ragprompt/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::errors::{PipelineError, Result};

/// Complete configuration for ragprompt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub refiner: RefinerConfig,
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub paths: PathsConfig,
}

/// Generative model used for query refinement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerConfig {
    /// "gemini", "ollama" or "none"
    pub provider: String,
    pub model: String,
    /// Overrides the provider's default endpoint
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Upper bound on refined queries kept from one model answer
    pub max_queries: usize,
}

/// Qdrant collection holding the pre-built index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub collection: String,
    /// Metric the collection was built with: cosine, dot, euclid, manhattan
    pub distance: String,
    pub timeout_secs: u64,
}

/// Query-time embedding model; must match the one used to build the index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "ollama" or "local"
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub normalize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Hits fetched for each refined query
    pub results_per_query: usize,
    /// Documents kept in the final prompt
    pub final_results: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Custom template; the built-in one is used when unset
    pub template_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Append-mode debug log; empty string disables it
    pub log_file: String,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash-001".to_string(),
            base_url: None,
            api_key_env: "GOOGLE_API_KEY".to_string(),
            timeout_secs: 30,
            max_queries: 5,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection: "revit_api_2025_arctic_l_refined_v3".to_string(),
            distance: "cosine".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "snowflake-arctic-embed2".to_string(),
            base_url: "http://127.0.0.1:11434".to_string(),
            normalize: true,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            results_per_query: 7,
            final_results: 15,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_file: "~/.ragprompt/logs/ragprompt.log".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| PipelineError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".ragprompt").join("config.toml");
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        match self.refiner.provider.as_str() {
            "gemini" | "ollama" | "none" => {}
            other => {
                return Err(PipelineError::Config(format!(
                    "Unknown refiner provider: {}",
                    other
                )))
            }
        }

        match self.embedding.provider.as_str() {
            "ollama" => {}
            // Local models are fetched from the HuggingFace hub by repo id
            "local" if is_hub_repo_id(&self.embedding.model) => {}
            "local" => {
                return Err(PipelineError::Config(format!(
                    "embedding.model '{}' is not a HuggingFace repo id (expected org/name) for the local provider",
                    self.embedding.model
                )))
            }
            other => {
                return Err(PipelineError::Config(format!(
                    "Unknown embedding provider: {}",
                    other
                )))
            }
        }

        match self.store.distance.as_str() {
            "cosine" | "dot" | "euclid" | "manhattan" => {}
            other => {
                return Err(PipelineError::Config(format!(
                    "Unknown distance metric: {}",
                    other
                )))
            }
        }

        if self.refiner.timeout_secs == 0 || self.store.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if self.refiner.max_queries == 0 {
            return Err(PipelineError::Config(
                "max_queries must be greater than 0".to_string(),
            ));
        }

        if self.retrieval.results_per_query == 0 || self.retrieval.final_results == 0 {
            return Err(PipelineError::Config(
                "results_per_query and final_results must be greater than 0".to_string(),
            ));
        }

        if self.store.collection.trim().is_empty() {
            return Err(PipelineError::Config(
                "store collection must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Log file path, if file logging is enabled
    pub fn log_file(&self) -> Option<PathBuf> {
        if self.paths.log_file.trim().is_empty() {
            None
        } else {
            Some(Self::expand_path(&self.paths.log_file))
        }
    }

    /// Custom template path, if configured
    pub fn template_path(&self) -> Option<PathBuf> {
        self.prompt.template_path.as_deref().map(Self::expand_path)
    }

    /// Read the refiner credential from the environment
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.refiner.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

fn is_hub_repo_id(model: &str) -> bool {
    match model.split_once('/') {
        Some((org, name)) => !org.trim().is_empty() && !name.trim().is_empty() && !name.contains('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.refiner.provider, "gemini");
        assert_eq!(config.refiner.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.retrieval.results_per_query, 7);
        assert_eq!(config.retrieval.final_results, 15);
        assert_eq!(config.store.distance, "cosine");
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_unknown_provider() {
        let mut config = Config::default();
        config.refiner.provider = "gpt".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_unknown_metric() {
        let mut config = Config::default();
        config.store.distance = "hamming".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_results() {
        let mut config = Config::default();
        config.retrieval.final_results = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.store.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[store]\ncollection = \"docs\"\n\n[retrieval]\nfinal_results = 4\n",
        )
        .unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.store.collection, "docs");
        assert_eq!(config.store.url, "http://localhost:6334");
        assert_eq!(config.retrieval.final_results, 4);
        assert_eq!(config.retrieval.results_per_query, 7);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store\n").unwrap();

        let err = Config::load(Some(path)).unwrap_err();
        assert_eq!(err.kind(), "Config");
    }

    #[test]
    fn test_local_embedding_requires_hub_repo_id() {
        let mut config = Config::default();
        config.embedding.provider = "local".to_string();

        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "Config");
        assert!(err.to_string().contains("snowflake-arctic-embed2"));

        config.embedding.model = "sentence-transformers/all-MiniLM-L6-v2".to_string();
        assert!(config.validate().is_ok());

        config.embedding.model = "/all-MiniLM-L6-v2".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = Config::expand_path("~/.ragprompt");
        assert!(!expanded.to_string_lossy().contains('~'));
    }

    #[test]
    fn test_log_file_disabled_by_empty_string() {
        let mut config = Config::default();
        config.paths.log_file = String::new();
        assert!(config.log_file().is_none());
    }
}
