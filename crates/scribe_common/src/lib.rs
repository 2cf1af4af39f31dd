//! Scribe Common - shared types and schemas for the article pipeline.
//!
//! Holds everything both the pipeline and its (separate) transport layers
//! need: request/response types, configuration, the error taxonomy, the
//! LLM provider clients and the lexical quality scorer.

pub mod article;
pub mod config;
pub mod error;
pub mod llm;
pub mod quality;

pub use article::*;
pub use config::*;
pub use error::PipelineError;
