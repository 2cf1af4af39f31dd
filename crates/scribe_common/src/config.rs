//! Configuration for the article pipeline.
//!
//! Loaded from a TOML file; every field has a default so a missing or
//! partial file still yields a working configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "http" for an OpenAI-compatible embeddings endpoint, "hash" for the
    /// deterministic local embedder
    #[serde(default = "default_embedding_backend")]
    pub backend: String,

    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector width of the active embedding model
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    pub api_key: Option<String>,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Where the fitted embedding matrix is persisted
    #[serde(default = "default_embedding_cache_path")]
    pub cache_path: String,
}

fn default_embedding_backend() -> String {
    "hash".to_string()
}

fn default_embedding_endpoint() -> String {
    "http://127.0.0.1:11434/v1".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_embedding_cache_path() -> String {
    "data/embeddings.bin".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_embedding_backend(),
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            api_key: None,
            timeout_secs: default_embedding_timeout(),
            cache_path: default_embedding_cache_path(),
        }
    }
}

/// LLM provider configuration. The first provider with a key wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub claude_api_key: Option<String>,

    #[serde(default = "default_claude_model")]
    pub claude_model: String,

    #[serde(default = "default_claude_endpoint")]
    pub claude_endpoint: String,

    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_endpoint")]
    pub openai_endpoint: String,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_claude_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_claude_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_provider_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            claude_api_key: None,
            claude_model: default_claude_model(),
            claude_endpoint: default_claude_endpoint(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_endpoint: default_openai_endpoint(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

/// Generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Exemplars included in each composed prompt
    #[serde(default = "default_num_examples")]
    pub num_style_examples: usize,

    /// Word budget per exemplar preview
    #[serde(default = "default_max_example_words")]
    pub max_example_words: usize,
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_num_examples() -> usize {
    3
}

fn default_max_example_words() -> usize {
    200
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            num_style_examples: default_num_examples(),
            max_example_words: default_max_example_words(),
        }
    }
}

/// Result cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// 24 hours
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl() -> u64 {
    86_400
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

/// Admission control ceilings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_per_minute")]
    pub requests_per_minute: usize,

    #[serde(default = "default_per_hour")]
    pub requests_per_hour: usize,
}

fn default_per_minute() -> usize {
    20
}

fn default_per_hour() -> usize {
    200
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_per_minute(),
            requests_per_hour: default_per_hour(),
        }
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,

    /// House brand woven into prompts, the fallback writer and scoring
    #[serde(default = "default_brand_name")]
    pub brand_name: String,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_corpus_path() -> String {
    "data/reference_articles.json".to_string()
}

fn default_brand_name() -> String {
    "Brightline".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            brand_name: default_brand_name(),
            embedding: EmbeddingConfig::default(),
            provider: ProviderConfig::default(),
            generation: GenerationConfig::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file is missing or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<PipelineConfig>(&raw) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config at {}: {} - using defaults", path.display(), e);
                    PipelineConfig::default()
                }
            },
            Err(_) => {
                info!("No config file at {}, using defaults", path.display());
                PipelineConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.rate_limit.requests_per_minute, 20);
        assert_eq!(config.rate_limit.requests_per_hour, 200);
        assert_eq!(config.cache.ttl_secs, 86_400);
        assert_eq!(config.generation.num_style_examples, 3);
        assert_eq!(config.embedding.backend, "hash");
        assert!(config.provider.claude_api_key.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let raw = r#"
            brand_name = "Northwind"

            [rate_limit]
            requests_per_minute = 5
        "#;
        let config: PipelineConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.brand_name, "Northwind");
        assert_eq!(config.rate_limit.requests_per_minute, 5);
        // untouched sections keep defaults
        assert_eq!(config.rate_limit.requests_per_hour, 200);
        assert_eq!(config.generation.max_tokens, 1500);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = PipelineConfig::load("/nonexistent/scribe.toml");
        assert_eq!(config.brand_name, "Brightline");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "corpus_path = \"articles.json\"\n").unwrap();
        let config = PipelineConfig::load(&path);
        assert_eq!(config.corpus_path, "articles.json");
    }
}
