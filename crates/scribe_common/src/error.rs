//! Error taxonomy for the generation pipeline.
//!
//! Only `RateLimitExceeded` and `InputValidation` ever reach the caller of
//! the pipeline entry point; everything downstream of admission is absorbed
//! by the orchestrator's fallback path.

use crate::llm::ProviderError;

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to load corpus: {0}")]
    CorpusLoad(String),

    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    EmbeddingDimensionMismatch { expected: usize, found: usize },

    #[error("embedding cache version mismatch: expected {expected}, found {found}")]
    CacheVersionMismatch { expected: u32, found: u32 },

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("persistence error: {0}")]
    Persist(String),
}

impl PipelineError {
    /// True for failures detected before generation begins, which are the
    /// only ones surfaced directly to callers.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PipelineError::RateLimitExceeded(_) | PipelineError::InputValidation(_)
        )
    }
}
