//! Generation orchestrator.
//!
//! Per-request state machine: cache check, retrieval, prompt composition,
//! provider call under an explicit retry policy, scoring and cache store.
//! Any failure past admission collapses into the deterministic template
//! fallback, so `generate` itself never fails.

use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use scribe_common::config::PipelineConfig;
use scribe_common::llm::{CompletionParams, Provider, ProviderError};
use scribe_common::quality::QualityScorer;
use scribe_common::{ArticleMetadata, GeneratedArticle, GenerationRequest};

use crate::cache::ResultCache;
use crate::corpus::CorpusStore;
use crate::embedder::Embedder;
use crate::prompt::PromptComposer;
use crate::retriever::{SearchFilters, SimilarityRetriever};
use crate::template::TemplateWriter;

/// Expired-entry sweep cadence, in generations.
const CLEANUP_INTERVAL: u64 = 10;

/// Explicit retry policy, invoked at the provider call site with an error
/// classifier. Only errors the classifier accepts are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub async fn run<F, Fut>(
        &self,
        mut op: F,
        is_retryable: impl Fn(&ProviderError) -> bool,
    ) -> Result<String, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, ProviderError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(text) => return Ok(text),
                Err(e) if is_retryable(&e) && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.jittered(delay);
                    warn!(
                        "Provider throttled ({}); retry {}/{} in {:.2}s",
                        e,
                        attempt,
                        self.max_retries,
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
                    delay = delay.mul_f64(self.backoff_factor);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// ±50% jitter, capped at max_delay.
    fn jittered(&self, delay: Duration) -> Duration {
        let wait = if self.jitter {
            delay.mul_f64(0.5 + rand::random::<f64>())
        } else {
            delay
        };
        wait.min(self.max_delay)
    }
}

/// Readiness report for the enclosing transport layer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineHealth {
    pub corpus_ready: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub cached_entries: usize,
}

pub struct GenerationOrchestrator {
    store: Arc<CorpusStore>,
    retriever: SimilarityRetriever,
    composer: PromptComposer,
    template: TemplateWriter,
    scorer: QualityScorer,
    provider: Option<Provider>,
    retry: RetryPolicy,
    cache: ResultCache,
    params: CompletionParams,
    num_style_examples: usize,
    generation_count: AtomicU64,
}

impl GenerationOrchestrator {
    pub fn new(
        store: Arc<CorpusStore>,
        embedder: Arc<Embedder>,
        provider: Option<Provider>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            retriever: SimilarityRetriever::new(Arc::clone(&store), embedder),
            store,
            composer: PromptComposer::new(
                config.brand_name.clone(),
                config.generation.max_example_words,
            ),
            template: TemplateWriter::new(config.brand_name.clone()),
            scorer: QualityScorer::new(config.brand_name.clone()),
            provider,
            retry: RetryPolicy::default(),
            cache: ResultCache::new(
                config.cache.capacity,
                Duration::from_secs(config.cache.ttl_secs),
            ),
            params: CompletionParams {
                max_tokens: config.generation.max_tokens,
                temperature: config.generation.temperature,
            },
            num_style_examples: config.generation.num_style_examples,
            generation_count: AtomicU64::new(0),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Stable cache key: keyword order is normalized, so logically identical
    /// requests share an entry.
    pub fn fingerprint(request: &GenerationRequest) -> String {
        let mut keywords: Vec<String> =
            request.keywords.iter().map(|k| k.to_lowercase()).collect();
        keywords.sort();

        let mut hasher = Sha256::new();
        hasher.update(request.topic.as_bytes());
        hasher.update([0]);
        hasher.update(request.category.as_deref().unwrap_or("").as_bytes());
        hasher.update([0]);
        hasher.update(keywords.join(",").as_bytes());
        hasher.update([0]);
        hasher.update(request.audience.as_bytes());
        hasher.update([0]);
        hasher.update(request.tone.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The pipeline entry point. Always returns an article: provider
    /// failures (including exhausted retries) fall back to the template
    /// writer rather than surfacing to the caller.
    pub async fn generate(&self, request: &GenerationRequest) -> GeneratedArticle {
        let started = Instant::now();
        let fingerprint = Self::fingerprint(request);

        if let Some(mut hit) = self.cache.get(&fingerprint) {
            info!("Returning cached article for '{}'", request.topic);
            hit.metadata.cache_hit = true;
            return hit;
        }

        let category = match &request.category {
            Some(category) => category.clone(),
            None => self.infer_category(&request.topic).await,
        };

        let (title, content, provider_name, model, fallback_error) = match &self.provider {
            Some(provider) => {
                let brief = PromptComposer::build_brief(request);
                let exemplars = match self
                    .retriever
                    .get_diverse_examples(&brief, self.num_style_examples, true)
                    .await
                {
                    Ok(exemplars) => exemplars,
                    Err(e) => {
                        warn!("Exemplar retrieval failed ({}); composing without examples", e);
                        Vec::new()
                    }
                };
                let prompt = self.composer.compose(request, &category, &exemplars);
                let outcome = self
                    .retry
                    .run(
                        || provider.complete(&prompt, &self.params),
                        ProviderError::is_retryable,
                    )
                    .await;
                match outcome {
                    Ok(text) => {
                        let (title, content) = extract_title(&text, &request.topic);
                        (
                            title,
                            content,
                            provider.name().to_string(),
                            provider.model().to_string(),
                            None,
                        )
                    }
                    Err(e) => {
                        warn!("Provider failed ({}); using template fallback", e);
                        let (title, content) = self.template.write(request, &category);
                        (
                            title,
                            content,
                            "template".to_string(),
                            "template_writer".to_string(),
                            Some(e.to_string()),
                        )
                    }
                }
            }
            None => {
                let (title, content) = self.template.write(request, &category);
                (
                    title,
                    content,
                    "template".to_string(),
                    "template_writer".to_string(),
                    None,
                )
            }
        };

        let fallback_used = fallback_error.is_some();
        let quality = Some(self.scorer.score(&content, &title));

        let article = GeneratedArticle {
            title,
            content: content.clone(),
            metadata: ArticleMetadata {
                category,
                keywords: request.keywords.clone(),
                audience: request.audience.clone(),
                tone: request.tone.clone(),
                word_count: content.split_whitespace().count(),
                provider: provider_name,
                model,
                generated_at: chrono::Utc::now().to_rfc3339(),
                generation_time_ms: started.elapsed().as_millis() as u64,
                cache_hit: false,
                fallback_used,
                fallback_error,
                quality,
            },
        };

        // Fallback articles are not cached; the next attempt should get
        // another shot at the real provider.
        if !fallback_used {
            self.cache.put(&fingerprint, article.clone());
        }

        let count = self.generation_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count % CLEANUP_INTERVAL == 0 {
            self.cache.purge_expired();
        }

        info!(
            "Generated article for '{}' in {}ms (provider: {})",
            request.topic,
            article.metadata.generation_time_ms,
            article.metadata.provider
        );
        article
    }

    /// Majority category among the top similar articles; "Business" when the
    /// corpus has nothing to say.
    async fn infer_category(&self, topic: &str) -> String {
        let results = match self
            .retriever
            .find_similar(topic, 3, &SearchFilters::default())
            .await
        {
            Ok(results) => results,
            Err(_) => Vec::new(),
        };
        if results.is_empty() {
            return "Business".to_string();
        }

        let mut counts: Vec<(String, usize)> = Vec::new();
        for result in &results {
            match counts
                .iter_mut()
                .find(|(category, _)| category == &result.article.category)
            {
                Some((_, n)) => *n += 1,
                None => counts.push((result.article.category.clone(), 1)),
            }
        }
        let max = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
        counts
            .into_iter()
            .find(|(_, n)| *n == max)
            .map(|(category, _)| category)
            .unwrap_or_else(|| "Business".to_string())
    }

    pub fn health(&self) -> PipelineHealth {
        PipelineHealth {
            corpus_ready: self.store.is_fitted(),
            provider: self.provider.as_ref().map(|p| p.name().to_string()),
            model: self.provider.as_ref().map(|p| p.model().to_string()),
            cached_entries: self.cache.len(),
        }
    }
}

/// Split generated text into (title, body). The first few lines are scanned
/// for a markdown heading or a short "Title: subtitle"-shaped line; failing
/// that, a title is derived from the topic and the body kept whole.
fn extract_title(text: &str, topic: &str) -> (String, String) {
    let lines: Vec<&str> = text.lines().collect();
    let mut seen = 0;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        seen += 1;
        if seen > 5 {
            break;
        }

        if let Some(stripped) = trimmed.strip_prefix('#') {
            let title = stripped.trim_start_matches('#').trim();
            if title.len() > 10 {
                return (title.to_string(), body_after(&lines, i, text));
            }
        } else if trimmed.len() > 10 && trimmed.len() < 100 && trimmed.contains(':') {
            return (trimmed.to_string(), body_after(&lines, i, text));
        }
    }

    (
        format!("{}: Strategic Analysis and Market Insights", topic),
        text.trim().to_string(),
    )
}

fn body_after(lines: &[&str], title_index: usize, whole: &str) -> String {
    let body = lines[title_index + 1..].join("\n").trim().to_string();
    if body.is_empty() {
        whole.trim().to_string()
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashEmbedder;
    use scribe_common::llm::FakeClient;
    use std::fs;

    async fn fitted_store(dir: &tempfile::TempDir) -> Arc<CorpusStore> {
        let corpus_path = dir.path().join("articles.json");
        let raw = r#"[
            {"title": "Campaign Analytics Playbook", "content": "campaign analytics customers brands loyalty measurement", "category": "Marketing"},
            {"title": "Attribution Deep Dive", "content": "campaign analytics attribution measurement funnels", "category": "Marketing"},
            {"title": "Silicon Roadmaps", "content": "kernel compilers hardware silicon fabrication", "category": "Technology"}
        ]"#;
        fs::write(&corpus_path, raw).unwrap();

        let store = Arc::new(CorpusStore::new(dir.path().join("emb.bin")));
        store.load(&corpus_path).unwrap();
        let embedder = Embedder::Hash(HashEmbedder::new(128));
        store.fit(&embedder, false).await.unwrap();
        store
    }

    fn orchestrator(
        store: Arc<CorpusStore>,
        provider: Option<Provider>,
        config: &PipelineConfig,
    ) -> GenerationOrchestrator {
        let embedder = Arc::new(Embedder::Hash(HashEmbedder::new(128)));
        GenerationOrchestrator::new(store, embedder, provider, config).with_retry_policy(
            RetryPolicy {
                max_retries: 3,
                initial_delay: Duration::from_millis(1),
                backoff_factor: 2.0,
                max_delay: Duration::from_millis(5),
                jitter: true,
            },
        )
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("campaign analytics")
            .with_category("Marketing")
            .with_keywords(vec!["attribution".into(), "measurement".into()])
    }

    #[test]
    fn test_fingerprint_keyword_order_independent() {
        let a = GenerationRequest::new("topic").with_keywords(vec!["b".into(), "a".into()]);
        let b = GenerationRequest::new("topic").with_keywords(vec!["a".into(), "B".into()]);
        assert_eq!(
            GenerationOrchestrator::fingerprint(&a),
            GenerationOrchestrator::fingerprint(&b)
        );

        let c = GenerationRequest::new("other topic").with_keywords(vec!["a".into(), "b".into()]);
        assert_ne!(
            GenerationOrchestrator::fingerprint(&a),
            GenerationOrchestrator::fingerprint(&c)
        );
    }

    #[tokio::test]
    async fn test_cache_hit_invokes_provider_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = fitted_store(&dir).await;
        let config = PipelineConfig::default();
        let provider = Provider::Fake(FakeClient::always_text(
            "# Campaign Analytics Decoded\n\nA full article body with many words.",
        ));
        let orch = orchestrator(store, Some(provider), &config);

        let first = orch.generate(&request()).await;
        assert!(!first.metadata.cache_hit);

        // Same request, keywords reordered
        let reordered = GenerationRequest::new("campaign analytics")
            .with_category("Marketing")
            .with_keywords(vec!["measurement".into(), "attribution".into()]);
        let second = orch.generate(&reordered).await;
        assert!(second.metadata.cache_hit);
        assert_eq!(second.title, first.title);
        assert_eq!(second.content, first.content);

        match &orch.provider {
            Some(Provider::Fake(fake)) => assert_eq!(fake.call_count(), 1),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_expired_ttl_reinvokes_provider() {
        let dir = tempfile::tempdir().unwrap();
        let store = fitted_store(&dir).await;
        let mut config = PipelineConfig::default();
        config.cache.ttl_secs = 0;
        let provider = Provider::Fake(FakeClient::always_text("# A Title Long Enough\n\nBody."));
        let orch = orchestrator(store, Some(provider), &config);

        orch.generate(&request()).await;
        let second = orch.generate(&request()).await;
        assert!(!second.metadata.cache_hit);

        match &orch.provider {
            Some(Provider::Fake(fake)) => assert_eq!(fake.call_count(), 2),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_template() {
        let dir = tempfile::tempdir().unwrap();
        let store = fitted_store(&dir).await;
        let config = PipelineConfig::default();
        let provider = Provider::Fake(FakeClient::always_error(ProviderError::Http(
            "500: upstream exploded".into(),
        )));
        let orch = orchestrator(store, Some(provider), &config);

        let article = orch.generate(&request()).await;
        assert!(article.metadata.fallback_used);
        assert!(!article.content.is_empty());
        assert_eq!(article.metadata.provider, "template");
        assert!(article
            .metadata
            .fallback_error
            .as_ref()
            .unwrap()
            .contains("upstream exploded"));

        // Fallback results are not cached: the provider gets another chance.
        let again = orch.generate(&request()).await;
        assert!(!again.metadata.cache_hit);
    }

    #[tokio::test]
    async fn test_quota_error_skips_retry_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = fitted_store(&dir).await;
        let config = PipelineConfig::default();
        let provider = Provider::Fake(FakeClient::always_error(ProviderError::QuotaExhausted(
            "billing".into(),
        )));
        let orch = orchestrator(store, Some(provider), &config);

        let article = orch.generate(&request()).await;
        assert!(article.metadata.fallback_used);
        match &orch.provider {
            Some(Provider::Fake(fake)) => assert_eq!(fake.call_count(), 1),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_retries_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = fitted_store(&dir).await;
        let config = PipelineConfig::default();
        let provider = Provider::Fake(FakeClient::new(vec![
            Err(ProviderError::RateLimited("slow down".into())),
            Err(ProviderError::RateLimited("still busy".into())),
            Ok("# Recovered After Backoff\n\nThe article body.".to_string()),
        ]));
        let orch = orchestrator(store, Some(provider), &config);

        let article = orch.generate(&request()).await;
        assert!(!article.metadata.fallback_used);
        assert_eq!(article.title, "Recovered After Backoff");
        match &orch.provider {
            Some(Provider::Fake(fake)) => assert_eq!(fake.call_count(), 3),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_no_provider_uses_template_directly() {
        let dir = tempfile::tempdir().unwrap();
        let store = fitted_store(&dir).await;
        let config = PipelineConfig::default();
        let orch = orchestrator(store, None, &config);

        let article = orch.generate(&request()).await;
        assert_eq!(article.metadata.provider, "template");
        assert!(!article.metadata.fallback_used);
        assert!(article.content.split_whitespace().count() > 50);
        assert!(article.metadata.quality.is_some());
    }

    #[tokio::test]
    async fn test_category_inferred_from_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let store = fitted_store(&dir).await;
        let config = PipelineConfig::default();
        let orch = orchestrator(store, None, &config);

        let req = GenerationRequest::new("campaign analytics measurement");
        let article = orch.generate(&req).await;
        assert_eq!(article.metadata.category, "Marketing");
    }

    #[tokio::test]
    async fn test_health_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = fitted_store(&dir).await;
        let config = PipelineConfig::default();
        let provider = Provider::Fake(FakeClient::always_text("# Healthy Title Here\n\nBody."));
        let orch = orchestrator(Arc::clone(&store), Some(provider), &config);

        let health = orch.health();
        assert!(health.corpus_ready);
        assert_eq!(health.provider.as_deref(), Some("fake"));
        assert_eq!(health.cached_entries, 0);

        orch.generate(&request()).await;
        assert_eq!(orch.health().cached_entries, 1);
    }

    #[tokio::test]
    async fn test_unready_corpus_still_generates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CorpusStore::new(dir.path().join("emb.bin")));
        let config = PipelineConfig::default();
        let orch = orchestrator(store, None, &config);

        assert!(!orch.health().corpus_ready);
        let article = orch.generate(&request()).await;
        assert!(!article.content.is_empty());
    }

    #[tokio::test]
    async fn test_retry_policy_gives_up_after_max_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(4),
            jitter: false,
        };
        let attempts = AtomicU64::new(0);
        let result = policy
            .run(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(ProviderError::RateLimited("always".into())) }
                },
                ProviderError::is_retryable,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3); // initial + 2 retries
    }

    #[test]
    fn test_extract_title_from_heading() {
        let text = "# The Future of Campaign Analytics\n\nFirst paragraph.\nSecond line.";
        let (title, body) = extract_title(text, "topic");
        assert_eq!(title, "The Future of Campaign Analytics");
        assert!(body.starts_with("First paragraph."));
    }

    #[test]
    fn test_extract_title_from_colon_line() {
        let text = "Analytics: A Primer for Leaders\nBody text follows here.";
        let (title, body) = extract_title(text, "topic");
        assert_eq!(title, "Analytics: A Primer for Leaders");
        assert_eq!(body, "Body text follows here.");
    }

    #[test]
    fn test_extract_title_falls_back_to_topic() {
        let text = "just a lowercase opening paragraph without any heading shape that runs on \
                    for quite a while so it cannot be mistaken for a short title line";
        let (title, body) = extract_title(text, "campaign analytics");
        assert_eq!(
            title,
            "campaign analytics: Strategic Analysis and Market Insights"
        );
        assert_eq!(body, text);
    }
}
