//! Query-time embedding functions
//!
//! The embedder must be the same model family/version that built the
//! index; nothing here can verify that at runtime.

pub mod engine;
pub mod ollama;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::cli::config::EmbeddingConfig;

pub use engine::BertEmbedder;
pub use ollama::OllamaEmbedder;

/// Text to vector function
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, logged at startup
    fn model_id(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Build the configured embedder.
///
/// The local model download and load run on the blocking pool.
pub async fn from_config(config: &EmbeddingConfig, timeout: Duration) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaEmbedder::new(
            &config.base_url,
            &config.model,
            config.normalize,
            timeout,
        )?)),
        "local" => {
            let model = config.model.clone();
            let normalize = config.normalize;
            let embedder = tokio::task::spawn_blocking(move || BertEmbedder::new(&model, normalize))
                .await
                .context("model loading task did not complete")??;
            Ok(Box::new(embedder))
        }
        other => anyhow::bail!("Unknown embedding provider: {other}"),
    }
}

/// Scale a vector to unit length in place (no-op for the zero vector)
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}
