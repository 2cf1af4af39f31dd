//! Scribe pipeline - retrieval-augmented business article generation.
//!
//! The pipeline retrieves stylistically similar reference articles from a
//! fitted corpus, composes them into a generation instruction, dispatches to
//! the active LLM provider with retry/backoff, and falls back to a
//! deterministic template writer when the provider fails. Admission control
//! and input sanitization guard the entry point; the HTTP surface that calls
//! into all of this lives elsewhere.

pub mod cache;
pub mod corpus;
pub mod embedder;
pub mod governor;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;
pub mod sanitize;
pub mod template;

pub use cache::ResultCache;
pub use corpus::{Corpus, CorpusStore};
pub use embedder::Embedder;
pub use governor::{RateGovernor, RateStatus};
pub use orchestrator::{GenerationOrchestrator, PipelineHealth, RetryPolicy};
pub use retriever::{RetrievalResult, SearchFilters, SimilarityRetriever};
