//! In-process stand-ins for the network collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use ragprompt::errors::{GenerationError, PipelineError, Result};
use ragprompt::memory::{Metadata, QueryResult, VectorStore};
use ragprompt::models::TextGenerator;

/// Generator that replays a fixed answer or a fixed failure
pub enum ScriptedGenerator {
    Answer(String),
    Unreachable,
    /// Never answers
    Hang,
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _prompt: &str) -> std::result::Result<String, GenerationError> {
        match self {
            ScriptedGenerator::Answer(text) => Ok(text.clone()),
            ScriptedGenerator::Unreachable => Err(GenerationError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            }),
            ScriptedGenerator::Hang => Ok(std::future::pending::<String>().await),
        }
    }
}

/// Store answering from a fixed query -> hits table
#[derive(Default)]
pub struct MemoryStore {
    table: HashMap<String, Vec<QueryResult>>,
    unavailable: bool,
    seen: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with(mut self, query: &str, hits: Vec<QueryResult>) -> Self {
        self.table.insert(query.to_string(), hits);
        self
    }

    /// Every query text the store was asked for, in order
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn query(&self, queries: &[String], k: usize) -> Result<Vec<Vec<QueryResult>>> {
        if self.unavailable {
            return Err(PipelineError::RetrievalUnavailable(
                "connection refused".to_string(),
            ));
        }
        if let Ok(mut seen) = self.seen.lock() {
            seen.extend(queries.iter().cloned());
        }

        Ok(queries
            .iter()
            .map(|q| {
                let mut hits = self.table.get(q).cloned().unwrap_or_default();
                hits.truncate(k);
                hits
            })
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.table.values().map(|hits| hits.len() as u64).sum())
    }
}

pub fn hit(id: &str, distance: f32) -> QueryResult {
    let mut metadata = Metadata::new();
    metadata.insert("api_element_name".to_string(), format!("Element.{}", id));
    metadata.insert("element_type".to_string(), "Method".to_string());

    QueryResult {
        id: Some(id.to_string()),
        document: Some(format!("doc {}", id)),
        metadata: Some(metadata),
        distance: Some(distance),
    }
}
