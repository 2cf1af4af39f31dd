//! Text embedding backends.
//!
//! The corpus store and retriever are written against one embedding
//! capability with two implementations: an OpenAI-compatible HTTP endpoint
//! for real deployments, and a deterministic feature-hashing embedder that
//! needs no network and keeps tests hermetic.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

use scribe_common::config::EmbeddingConfig;
use scribe_common::PipelineError;

/// The active embedding backend, fixed at construction.
pub enum Embedder {
    Http(HttpEmbedder),
    Hash(HashEmbedder),
}

impl Embedder {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        match config.backend.as_str() {
            "http" => Embedder::Http(HttpEmbedder::new(
                config.endpoint.clone(),
                config.model.clone(),
                config.dimension,
                config.api_key.clone(),
                config.timeout_secs,
            )),
            _ => Embedder::Hash(HashEmbedder::new(config.dimension)),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        match self {
            Embedder::Http(e) => {
                let mut vectors = e.embed_batch(&[text]).await?;
                vectors.pop().ok_or_else(|| {
                    PipelineError::Embedding("endpoint returned no vectors".to_string())
                })
            }
            Embedder::Hash(e) => Ok(e.embed(text)),
        }
    }

    /// Embed a batch of texts, one vector per input, in input order.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        match self {
            Embedder::Http(e) => e.embed_batch(texts).await,
            Embedder::Hash(e) => Ok(texts.iter().map(|t| e.embed(t)).collect()),
        }
    }

    /// Vector width every produced embedding must have.
    pub fn dimension(&self) -> usize {
        match self {
            Embedder::Http(e) => e.dimension,
            Embedder::Hash(e) => e.dimension,
        }
    }

    /// Identifier persisted alongside the embedding cache; a change
    /// invalidates the artifact.
    pub fn model_id(&self) -> &str {
        match self {
            Embedder::Http(e) => &e.model,
            Embedder::Hash(_) => "feature-hash-v1",
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: String,
        model: String,
        dimension: usize,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            endpoint,
            model,
            dimension,
            api_key,
        }
    }

    pub async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.endpoint.trim_end_matches('/'));
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        debug!("Embedding {} texts via {}", inputs.len(), url);

        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PipelineError::Embedding(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Embedding(format!(
                "endpoint returned {}: {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Embedding(format!("invalid response: {}", e)))?;

        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != inputs.len() {
            return Err(PipelineError::Embedding(format!(
                "endpoint returned {} vectors for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        for entry in &parsed.data {
            if entry.embedding.len() != self.dimension {
                return Err(PipelineError::EmbeddingDimensionMismatch {
                    expected: self.dimension,
                    found: entry.embedding.len(),
                });
            }
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Deterministic feature-hashing embedder.
///
/// Each token is hashed into a fixed-width vector with a stable sign bit,
/// then the vector is L2-normalized. Texts that share vocabulary land close
/// together, which is all the retriever needs for offline operation.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes(digest[0..8].try_into().expect("digest width"));
            let index = (bucket % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

/// Tokenize text into hashable tokens (deterministic)
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
        .filter(|s| s.len() >= 2)
        .map(String::from)
        .collect()
}
