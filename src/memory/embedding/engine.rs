// Local sentence embeddings through Candle (BERT family)
use anyhow::{Context, Result};
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::path::PathBuf;
use std::sync::Arc;
use tokenizers::Tokenizer;

use super::{l2_normalize, Embedder};

struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl ModelFiles {
    fn fetch(model_id: &str) -> Result<Self> {
        let api = Api::new().context("HuggingFace hub client unavailable")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));
        let get = |name: &str| {
            repo.get(name)
                .with_context(|| format!("{}: cannot fetch {}", model_id, name))
        };

        Ok(Self {
            config: get("config.json")?,
            tokenizer: get("tokenizer.json")?,
            weights: get("model.safetensors")?,
        })
    }
}

/// Query embedder running a BERT-style model via Candle.
///
/// Cheap to clone; inference runs on the blocking pool.
#[derive(Clone)]
pub struct BertEmbedder {
    model: Arc<BertModel>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    model_id: String,
    normalize: bool,
}

impl BertEmbedder {
    /// Load a BERT-family model from the HuggingFace hub (cached after the first download)
    pub fn new(model_id: &str, normalize: bool) -> Result<Self> {
        let device = Device::Cpu;
        let files = ModelFiles::fetch(model_id)?;

        let config: Config = serde_json::from_str(&std::fs::read_to_string(&files.config)?)
            .with_context(|| format!("{} has an unreadable config.json", model_id))?;
        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow::anyhow!("{}: cannot load tokenizer: {}", model_id, e))?;

        // Safety: the weights file is owned by the hub cache and not modified while mapped
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], candle_core::DType::F32, &device)
        }
        .with_context(|| format!("{}: cannot map weights", model_id))?;
        let model = BertModel::load(vb, &config)
            .with_context(|| format!("{} is not a BERT-compatible model", model_id))?;

        tracing::info!(model = model_id, "loaded local embedding model");
        Ok(Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            device,
            model_id: model_id.to_string(),
            normalize,
        })
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self.tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch_size = texts.len();

        // Right-pad every sequence to the longest one
        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];
        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let start = row * max_len;
            flat_ids[start..start + ids.len()].copy_from_slice(ids);
            flat_mask[start..start + mask.len()].copy_from_slice(mask);
        }

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)?;
        let token_type_ids = token_ids.zeros_like()?;

        let hidden = self.model.forward(&token_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = Self::mean_pool(&hidden, &attention_mask)?;

        let mut vectors = pooled.to_vec2::<f32>()?;
        if self.normalize {
            vectors.iter_mut().for_each(|v| l2_normalize(v));
        }
        Ok(vectors)
    }

    /// Mean pooling with attention mask
    fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let mask_expanded = attention_mask
            .unsqueeze(2)?
            .expand(embeddings.shape())?
            .to_dtype(embeddings.dtype())?;

        let sum_embeddings = (embeddings * &mask_expanded)?.sum(1)?;
        let sum_mask = mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;

        Ok(sum_embeddings.broadcast_div(&sum_mask)?)
    }
}

#[async_trait]
impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embedder = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || embedder.encode(&texts))
            .await
            .context("embedding task did not complete")?
    }
}
