//! Doctor command for system diagnostics
//!
//! Checks everything a run depends on without building a prompt.

use colored::Colorize;
use reqwest::Client;
use std::io::Write;
use std::time::Duration;

use crate::cli::config::Config;
use crate::memory::embedding;
use crate::memory::vector_db::{DistanceMetric, QdrantStore, VectorStore};
use crate::models::client::{DEFAULT_GEMINI_URL, DEFAULT_OLLAMA_URL};
use crate::rag::context::PromptTemplate;

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

/// Doctor diagnostics system
pub struct Doctor {
    config: Config,
}

impl Doctor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        vec![
            self.check_credential(),
            self.check_template(),
            self.check_generator().await,
            self.check_vector_store().await,
        ]
    }

    /// Check 1: refinement credential (absence only degrades refinement)
    fn check_credential(&self) -> HealthCheck {
        let name = "Credential";
        if self.config.refiner.provider != "gemini" {
            return HealthCheck::new(name, HealthStatus::Pass);
        }

        match self.config.api_key() {
            Some(_) => HealthCheck::new(name, HealthStatus::Pass),
            None => HealthCheck::new(
                name,
                HealthStatus::Warn(format!(
                    "{} not set; queries will not be refined",
                    self.config.refiner.api_key_env
                )),
            ),
        }
    }

    /// Check 2: prompt template parses and has both placeholders
    fn check_template(&self) -> HealthCheck {
        match PromptTemplate::load(self.config.template_path().as_deref()) {
            Ok(_) => HealthCheck::new("Template", HealthStatus::Pass),
            Err(e) => HealthCheck::new("Template", HealthStatus::Fail(e.to_string())),
        }
    }

    /// Check 3: refinement endpoint reachable
    async fn check_generator(&self) -> HealthCheck {
        let name = "Refiner Model";
        let refiner = &self.config.refiner;

        let url = match refiner.provider.as_str() {
            "none" => return HealthCheck::new(name, HealthStatus::Warn("refinement disabled".to_string())),
            "ollama" => format!(
                "{}/api/tags",
                refiner.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL).trim_end_matches('/')
            ),
            _ => format!(
                "{}/v1beta/models",
                refiner.base_url.as_deref().unwrap_or(DEFAULT_GEMINI_URL).trim_end_matches('/')
            ),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        // Any HTTP answer means the endpoint is up; auth is covered by the credential check
        match client.get(&url).send().await {
            Ok(_) => HealthCheck::new(name, HealthStatus::Pass),
            Err(e) => HealthCheck::new(
                name,
                HealthStatus::Warn(format!("{} unreachable ({}); refinement will fall back", url, e)),
            ),
        }
    }

    /// Check 4: vector store reachable and collection populated
    async fn check_vector_store(&self) -> HealthCheck {
        let name = "Vector Store";
        let store = &self.config.store;

        let metric = match DistanceMetric::parse(&store.distance) {
            Some(metric) => metric,
            None => {
                return HealthCheck::new(
                    name,
                    HealthStatus::Fail(format!("unknown distance metric {}", store.distance)),
                )
            }
        };

        let timeout = Duration::from_secs(store.timeout_secs);
        let embedder = match embedding::from_config(&self.config.embedding, timeout).await {
            Ok(embedder) => embedder,
            Err(e) => return HealthCheck::new(name, HealthStatus::Fail(format!("embedder: {:#}", e))),
        };

        let connected = QdrantStore::connect(&store.url, &store.collection, embedder, metric, timeout).await;
        match connected {
            Ok(qdrant) => match qdrant.count().await {
                Ok(0) => HealthCheck::new(
                    name,
                    HealthStatus::Warn(format!("collection {} is empty", store.collection)),
                ),
                Ok(_) => HealthCheck::new(name, HealthStatus::Pass),
                Err(e) => HealthCheck::new(name, HealthStatus::Fail(e.to_string())),
            },
            Err(e) => HealthCheck::new(name, HealthStatus::Fail(e.to_string())),
        }
    }

    /// Write one line per check
    pub fn display_results<W: Write>(out: &mut W, checks: &[HealthCheck]) -> std::io::Result<()> {
        for check in checks {
            let status = match &check.status {
                HealthStatus::Pass => "PASS".green().to_string(),
                HealthStatus::Warn(msg) => format!("{} {}", "WARN".yellow(), msg),
                HealthStatus::Fail(msg) => format!("{} {}", "FAIL".red(), msg),
            };
            writeln!(out, "{:<16} {}", check.name, status)?;
        }
        Ok(())
    }

    /// Get overall health status
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}
