// Retrieval engine: fan refined queries out to the vector store
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cli::config::RetrievalConfig;
use crate::errors::Result;
use crate::memory::vector_db::{QueryResult, VectorStore};
use crate::rag::retrieval::aggregate::{aggregate, DocumentHit};

/// Search parameters for retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Hits fetched for each refined query
    pub results_per_query: usize,
    /// Documents kept after merging
    pub final_results: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            results_per_query: 7,
            final_results: 15,
        }
    }
}

impl From<&RetrievalConfig> for SearchParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            results_per_query: config.results_per_query,
            final_results: config.final_results,
        }
    }
}

/// Retrieval engine over a vector store
pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    params: SearchParams,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn VectorStore>, params: SearchParams) -> Self {
        Self { store, params }
    }

    /// One hit list per query, in query order
    pub async fn fetch(&self, queries: &[String]) -> Result<Vec<Vec<QueryResult>>> {
        tracing::debug!(
            queries = queries.len(),
            k = self.params.results_per_query,
            "querying vector store"
        );
        let mut batches = self.store.query(queries, self.params.results_per_query).await?;

        // A short batch means trailing queries produced nothing
        batches.resize_with(queries.len(), Vec::new);

        for (query, hits) in queries.iter().zip(&batches) {
            if hits.is_empty() {
                tracing::info!(query = %query, "no results for refined query");
            }
        }
        Ok(batches)
    }

    /// Merge per-query hits into the ranked context list
    pub fn rank(&self, batches: Vec<Vec<QueryResult>>) -> Vec<DocumentHit> {
        aggregate(batches, self.params.final_results)
    }

}
