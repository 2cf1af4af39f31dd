//! Article and generation request/response types.
//!
//! `Article` mirrors one record of the corpus input file; missing fields are
//! filled with defaults at load time. The generation types are the payloads
//! exchanged with the (separate) transport layer.

use serde::{Deserialize, Serialize};

use crate::quality::QualityReport;

/// A reference article from the corpus. Immutable after load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Stable index into the corpus; row i of the embedding matrix
    /// corresponds to article i.
    #[serde(default)]
    pub id: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
    /// Derived by whitespace split of content when the record omits it.
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub topic_slug: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub source: String,
}

/// Target article length, mapped to a word budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentLength {
    Short,
    Medium,
    Long,
    Comprehensive,
}

impl ContentLength {
    pub fn target_words(&self) -> usize {
        match self {
            ContentLength::Short => 400,
            ContentLength::Medium => 800,
            ContentLength::Long => 1200,
            ContentLength::Comprehensive => 1600,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentLength::Short => "short",
            ContentLength::Medium => "medium",
            ContentLength::Long => "long",
            ContentLength::Comprehensive => "comprehensive",
        }
    }
}

impl Default for ContentLength {
    fn default() -> Self {
        ContentLength::Medium
    }
}

/// Extended generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Specific industry focus
    pub industry: Option<String>,
    /// Company or brand context woven into the brief
    pub company_context: Option<String>,
    /// Reference data source mentioned in the brief
    pub data_source: Option<String>,
    #[serde(default)]
    pub content_length: ContentLength,
    #[serde(default = "default_true")]
    pub include_statistics: bool,
    #[serde(default = "default_true")]
    pub include_case_studies: bool,
    #[serde(default = "default_cta")]
    pub call_to_action: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            industry: None,
            company_context: None,
            data_source: None,
            content_length: ContentLength::default(),
            include_statistics: default_true(),
            include_case_studies: default_true(),
            call_to_action: default_cta(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cta() -> String {
    "consultation".to_string()
}

/// One article generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    /// Inferred from the corpus when absent.
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default)]
    pub options: GenerationOptions,
}

fn default_audience() -> String {
    "business professionals".to_string()
}

fn default_tone() -> String {
    "professional".to_string()
}

impl GenerationRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            category: None,
            keywords: vec![],
            audience: default_audience(),
            tone: default_tone(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Metadata attached to every generated article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub category: String,
    pub keywords: Vec<String>,
    pub audience: String,
    pub tone: String,
    pub word_count: usize,
    /// Provider identifier ("claude", "openai", "template")
    pub provider: String,
    /// Model identifier used for the completion
    pub model: String,
    /// RFC 3339 generation timestamp
    pub generated_at: String,
    pub generation_time_ms: u64,
    pub cache_hit: bool,
    pub fallback_used: bool,
    /// The error that triggered the fallback, when one did.
    pub fallback_error: Option<String>,
    /// Null when scoring failed; never blocks the response.
    pub quality: Option<QualityReport>,
}

/// A generated article, the pipeline's final product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    pub content: String,
    pub metadata: ArticleMetadata,
}
