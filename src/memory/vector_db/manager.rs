// Vector store client - Qdrant collection holding the pre-built API index
use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        point_id::PointIdOptions, value::Kind, with_payload_selector::SelectorOptions, PointId,
        ScoredPoint, SearchPoints, Value as QdrantValue, WithPayloadSelector,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

use crate::errors::{PipelineError, Result};
use crate::memory::embedding::Embedder;

/// Payload key holding the indexed text
pub const DOCUMENT_KEY: &str = "document";

/// String metadata attached to an indexed document
pub type Metadata = BTreeMap<String, String>;

/// One raw nearest-neighbour hit as returned by the store.
///
/// Fields are optional because the store does not guarantee complete
/// records; the aggregator drops incomplete ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: Option<String>,
    pub document: Option<String>,
    pub metadata: Option<Metadata>,
    pub distance: Option<f32>,
}

/// Nearest-neighbour search over a pre-built index
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Top-k hits per query text, one inner list per input query, each
    /// ordered ascending by distance. A query the store could not process
    /// yields an empty inner list.
    async fn query(&self, queries: &[String], k: usize) -> Result<Vec<Vec<QueryResult>>>;

    /// Number of indexed documents
    async fn count(&self) -> Result<u64>;
}

/// Metric the collection was built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclid,
    Manhattan,
}

impl DistanceMetric {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cosine" => Some(Self::Cosine),
            "dot" => Some(Self::Dot),
            "euclid" => Some(Self::Euclid),
            "manhattan" => Some(Self::Manhattan),
            _ => None,
        }
    }

    /// Convert a Qdrant score to a non-negative distance (smaller = closer).
    ///
    /// Cosine scores are bounded by 1, so `1 - score` keeps their order.
    /// Dot products are unbounded and need a strictly decreasing map.
    /// Euclid and Manhattan already score lower-is-better.
    pub fn score_to_distance(&self, score: f32) -> f32 {
        match self {
            Self::Cosine => (1.0 - score).max(0.0),
            Self::Dot => (-score).exp(),
            Self::Euclid | Self::Manhattan => score.max(0.0),
        }
    }
}

/// Qdrant-backed vector store
pub struct QdrantStore {
    client: QdrantClient,
    collection: String,
    embedder: Box<dyn Embedder>,
    metric: DistanceMetric,
    timeout: Duration,
}

impl QdrantStore {
    /// Connect and verify the collection exists
    pub async fn connect(
        url: &str,
        collection: &str,
        embedder: Box<dyn Embedder>,
        metric: DistanceMetric,
        timeout: Duration,
    ) -> Result<Self> {
        let client = QdrantClient::from_url(url).build().map_err(|e| {
            PipelineError::RetrievalUnavailable(format!("Failed to create Qdrant client for {}: {}", url, e))
        })?;

        let store = Self {
            client,
            collection: collection.to_string(),
            embedder,
            metric,
            timeout,
        };

        let count = store.count().await?;
        tracing::info!(
            collection = %store.collection,
            points = count,
            embedding_model = store.embedder.model_id(),
            "connected to vector store"
        );

        Ok(store)
    }

    /// Run a store call under the retrieval timeout
    async fn bounded<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                PipelineError::RetrievalUnavailable(format!(
                    "{} timed out after {}ms",
                    what,
                    self.timeout.as_millis()
                ))
            })?
    }

    async fn search(&self, vector: Vec<f32>, k: usize) -> std::result::Result<Vec<ScoredPoint>, String> {
        let request = SearchPoints {
            collection_name: self.collection.clone(),
            vector,
            limit: k as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        match tokio::time::timeout(self.timeout, self.client.search_points(&request)).await {
            Ok(Ok(response)) => Ok(response.result),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {}ms", self.timeout.as_millis())),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn query(&self, queries: &[String], k: usize) -> Result<Vec<Vec<QueryResult>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self
            .bounded("embedding queries", async {
                self.embedder.embed_batch(queries).await.map_err(|e| {
                    PipelineError::RetrievalUnavailable(format!("Failed to embed queries: {:#}", e))
                })
            })
            .await?;

        check_vector_count(vectors.len(), queries.len())?;

        let mut outcomes: Vec<std::result::Result<Vec<QueryResult>, String>> =
            Vec::with_capacity(queries.len());
        for vector in vectors {
            let outcome = self.search(vector, k).await.map(|points| {
                points
                    .into_iter()
                    .map(|p| point_to_result(p, self.metric))
                    .collect()
            });
            outcomes.push(outcome);
        }

        collect_batches(queries, outcomes, &self.collection)
    }

    async fn count(&self) -> Result<u64> {
        self.bounded("collection lookup", async {
            let info = self
                .client
                .collection_info(&self.collection)
                .await
                .map_err(|e| {
                    PipelineError::RetrievalUnavailable(format!(
                        "Failed to access collection '{}': {}",
                        self.collection, e
                    ))
                })?;

            Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
        })
        .await
    }
}

/// The embedder must return exactly one vector per query
fn check_vector_count(vectors: usize, queries: usize) -> Result<()> {
    if vectors != queries {
        return Err(PipelineError::RetrievalUnavailable(format!(
            "embedder returned {} vectors for {} queries",
            vectors, queries
        )));
    }
    Ok(())
}

/// Fold per-query search outcomes into batches.
///
/// A failed search becomes an empty batch; only when every search failed
/// is the store treated as unavailable.
fn collect_batches(
    queries: &[String],
    outcomes: Vec<std::result::Result<Vec<QueryResult>, String>>,
    collection: &str,
) -> Result<Vec<Vec<QueryResult>>> {
    let mut batches = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();

    for (query, outcome) in queries.iter().zip(outcomes) {
        match outcome {
            Ok(hits) => batches.push(hits),
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "search failed for query");
                failures.push(e);
                batches.push(Vec::new());
            }
        }
    }

    if !failures.is_empty() && failures.len() == batches.len() {
        return Err(PipelineError::RetrievalUnavailable(format!(
            "all {} searches against '{}' failed: {}",
            failures.len(),
            collection,
            failures[0]
        )));
    }

    Ok(batches)
}

/// Convert a scored point into a raw query result
pub fn point_to_result(point: ScoredPoint, metric: DistanceMetric) -> QueryResult {
    let id = point_id_to_string(&point.id);
    let distance = Some(metric.score_to_distance(point.score));
    let (document, metadata) = split_payload(point.payload);

    QueryResult {
        id,
        document,
        metadata: Some(metadata),
        distance,
    }
}

fn split_payload(payload: HashMap<String, QdrantValue>) -> (Option<String>, Metadata) {
    let mut document = None;
    let mut metadata = Metadata::new();

    for (key, value) in payload {
        if key == DOCUMENT_KEY {
            document = qdrant_value_to_string(&value);
        } else if let Some(text) = qdrant_value_to_string(&value) {
            metadata.insert(key, text);
        }
    }

    (document, metadata)
}

fn qdrant_value_to_string(value: &QdrantValue) -> Option<String> {
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(s.clone()),
        Kind::IntegerValue(i) => Some(i.to_string()),
        Kind::DoubleValue(f) => Some(f.to_string()),
        Kind::BoolValue(b) => Some(b.to_string()),
        _ => None,
    })
}

fn point_id_to_string(point_id: &Option<PointId>) -> Option<String> {
    point_id.as_ref().and_then(|id| match &id.point_id_options {
        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
        Some(PointIdOptions::Uuid(u)) => Some(u.clone()),
        None => None,
    })
}
