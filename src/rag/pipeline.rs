// End-to-end pipeline: refine -> retrieve -> aggregate -> assemble
use std::sync::Arc;
use std::time::Duration;

use crate::cli::config::Config;
use crate::errors::{PipelineError, Result};
use crate::memory::embedding;
use crate::memory::vector_db::{DistanceMetric, QdrantStore, VectorStore};
use crate::rag::context::PromptTemplate;
use crate::rag::refiner::{QueryRefiner, RefinedQueries};
use crate::rag::retrieval::{DocumentHit, RetrievalEngine, SearchParams};
use crate::rag::state::{CancelFlag, PipelineEvent, PipelineState, StateTracker};

/// Pipeline run result
#[derive(Debug, Clone)]
pub struct RAGResult {
    /// Original, unrefined query
    pub query: String,
    /// Final prompt for the code-generation model
    pub prompt: String,
    /// Queries actually used for retrieval
    pub refined: RefinedQueries,
    /// Ranked context documents, best first
    pub documents: Vec<DocumentHit>,
    /// States visited, Start through Done
    pub trace: Vec<PipelineState>,
}

/// End-to-end RAG pipeline.
///
/// Built once at process start; holds no per-run state, so each call to
/// `execute` starts from a fresh state machine.
pub struct RAGPipeline {
    refiner: QueryRefiner,
    retrieval: RetrievalEngine,
    template: PromptTemplate,
}

impl RAGPipeline {
    pub fn new(
        refiner: QueryRefiner,
        store: Arc<dyn VectorStore>,
        template: PromptTemplate,
        params: SearchParams,
    ) -> Self {
        Self {
            refiner,
            retrieval: RetrievalEngine::new(store, params),
            template,
        }
    }

    /// Build every collaborator from configuration.
    ///
    /// The template is parsed before any network call so a broken template
    /// fails fast.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let template = PromptTemplate::load(config.template_path().as_deref())?;

        let api_key = config.api_key();
        if config.refiner.provider == "gemini" {
            match &api_key {
                Some(_) => tracing::info!("{} found; model refinement enabled", config.refiner.api_key_env),
                None => tracing::warn!(
                    "{} is not set; retrieval will use the original query",
                    config.refiner.api_key_env
                ),
            }
        }
        let refiner = QueryRefiner::from_config(&config.refiner, api_key);

        let timeout = Duration::from_secs(config.store.timeout_secs);
        let metric = DistanceMetric::parse(&config.store.distance).ok_or_else(|| {
            PipelineError::Config(format!("Unknown distance metric: {}", config.store.distance))
        })?;
        let embedder = embedding::from_config(&config.embedding, timeout)
            .await
            .map_err(|e| {
                PipelineError::RetrievalUnavailable(format!("Failed to initialise embedder: {:#}", e))
            })?;
        tracing::info!(
            model = embedder.model_id(),
            "query embedding model (must match the model that built the index)"
        );

        let store = QdrantStore::connect(
            &config.store.url,
            &config.store.collection,
            embedder,
            metric,
            timeout,
        )
        .await?;

        Ok(Self::new(
            refiner,
            Arc::new(store),
            template,
            SearchParams::from(&config.retrieval),
        ))
    }

    /// Run the pipeline for one query
    pub async fn execute(&self, query: &str, cancel: &CancelFlag) -> Result<RAGResult> {
        let mut tracker = StateTracker::new();

        match self.drive(query, cancel, &mut tracker).await {
            Ok((prompt, refined, documents)) => Ok(RAGResult {
                query: query.to_string(),
                prompt,
                refined,
                documents,
                trace: tracker.trace().to_vec(),
            }),
            Err(e) => {
                let failed_in = tracker.state();
                tracker.fail();
                tracing::error!(state = ?failed_in, kind = e.kind(), "pipeline failed: {}", e);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        query: &str,
        cancel: &CancelFlag,
        tracker: &mut StateTracker,
    ) -> Result<(String, RefinedQueries, Vec<DocumentHit>)> {
        cancel.check(PipelineState::Start)?;
        if query.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }
        tracing::info!(query = query, "received query");

        let state = tracker.advance(PipelineEvent::QueryAccepted)?;
        cancel.check(state)?;
        let refined = cancel.guard(state, self.refiner.refine(query)).await?;
        tracing::info!(queries = ?refined.as_slice(), "using queries for retrieval");

        let state = tracker.advance(PipelineEvent::Refined)?;
        cancel.check(state)?;
        let batches = cancel
            .guard(state, self.retrieval.fetch(refined.as_slice()))
            .await?;

        let state = tracker.advance(PipelineEvent::Retrieved)?;
        cancel.check(state)?;
        let documents = self.retrieval.rank(batches);
        log_ranking(&documents);

        let state = tracker.advance(PipelineEvent::Aggregated)?;
        cancel.check(state)?;
        let context: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let prompt = self.template.render(&context, query);

        tracker.advance(PipelineEvent::Assembled)?;
        Ok((prompt, refined, documents))
    }
}

fn log_ranking(documents: &[DocumentHit]) {
    if documents.is_empty() {
        tracing::warn!("no relevant documents found for any query; prompt will carry no context");
        return;
    }

    tracing::info!(selected = documents.len(), "selected top results");
    for (i, doc) in documents.iter().enumerate() {
        tracing::debug!(
            "result {}: id={} distance={:.4} api={} type={} snippet={:?}",
            i + 1,
            doc.id,
            doc.distance,
            doc.meta("api_element_name"),
            doc.meta("element_type"),
            doc.snippet(100)
        );
    }
}
