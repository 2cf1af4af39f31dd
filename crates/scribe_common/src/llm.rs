//! LLM provider clients behind a single completion capability.
//!
//! One provider is selected at construction time by key availability
//! (Claude first, then OpenAI); every variant exposes the same
//! `complete(prompt, params) -> text` call. Errors are classified from the
//! provider's structured error payload, not from message text, so the retry
//! layer can distinguish transient rate limiting from terminal failures.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;

/// System instruction shared by the remote providers.
const WRITER_SYSTEM_PROMPT: &str = "You are an expert business content writer with deep \
    experience in strategic analysis, market intelligence and executive communication. You \
    create forward-thinking, data-driven articles for senior business leaders.";

/// Sampling parameters for one completion call
#[derive(Debug, Clone, Copy)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            temperature: 0.7,
        }
    }
}

/// Provider call errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Transient throttling; the only retryable class
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Billing quota exhausted; retrying cannot help
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    #[error("provider returned empty response")]
    EmptyResponse,

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

// --- wire types ---------------------------------------------------------

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    system: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: String,
}

/// Structured error body returned by both APIs.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: ApiErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    code: Option<String>,
}

/// Classify a failed Claude response by status and structured error type.
fn classify_claude_error(status: StatusCode, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .unwrap_or_default()
        .error;
    match status.as_u16() {
        401 | 403 => ProviderError::Auth(detail.message),
        429 => ProviderError::RateLimited(detail.message),
        // Overloaded upstream behaves like throttling
        529 => ProviderError::RateLimited(detail.message),
        _ if detail.kind == "overloaded_error" => ProviderError::RateLimited(detail.message),
        _ => ProviderError::Http(format!("{}: {}", status, detail.message)),
    }
}

/// Classify a failed OpenAI response. A 429 carries either transient
/// throttling or terminal quota exhaustion; the `error.type`/`error.code`
/// field tells them apart.
fn classify_openai_error(status: StatusCode, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .unwrap_or_default()
        .error;
    let quota = detail.kind == "insufficient_quota"
        || detail.code.as_deref() == Some("insufficient_quota");
    match status.as_u16() {
        401 | 403 => ProviderError::Auth(detail.message),
        429 if quota => ProviderError::QuotaExhausted(detail.message),
        429 => ProviderError::RateLimited(detail.message),
        _ => ProviderError::Http(format!("{}: {}", status, detail.message)),
    }
}

// --- clients ------------------------------------------------------------

/// Anthropic messages API client
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    timeout_secs: u64,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: String, endpoint: String, timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key,
            model,
            endpoint,
            timeout_secs,
        }
    }

    pub async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.endpoint.trim_end_matches('/'));
        let request = ClaudeRequest {
            model: self.model.clone(),
            system: WRITER_SYSTEM_PROMPT.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        debug!("Claude call [{}] ({} prompt chars)", self.model, prompt.len());

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout_secs)
                } else {
                    ProviderError::Http(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Claude returned {}", status);
            return Err(classify_claude_error(status, &body));
        }

        let parsed: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}

/// OpenAI chat completions client
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, endpoint: String, timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key,
            model,
            endpoint,
            timeout_secs,
        }
    }

    pub async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/chat/completions",
            self.endpoint.trim_end_matches('/')
        );
        let request = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: WRITER_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        debug!("OpenAI call [{}] ({} prompt chars)", self.model, prompt.len());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout_secs)
                } else {
                    ProviderError::Http(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("OpenAI returned {}", status);
            return Err(classify_openai_error(status, &body));
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Scripted provider for hermetic tests. Responses are consumed in order;
/// the last one repeats once the script runs out.
pub struct FakeClient {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl FakeClient {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_text(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    pub fn always_error(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn complete(
        &self,
        _prompt: &str,
        _params: &CompletionParams,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        if responses.len() == 1 {
            responses[0].clone()
        } else {
            responses.remove(0)
        }
    }
}

/// The active completion backend, fixed at construction.
pub enum Provider {
    Claude(ClaudeClient),
    OpenAi(OpenAiClient),
    Fake(FakeClient),
}

impl Provider {
    pub async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, ProviderError> {
        match self {
            Provider::Claude(client) => client.complete(prompt, params).await,
            Provider::OpenAi(client) => client.complete(prompt, params).await,
            Provider::Fake(client) => client.complete(prompt, params).await,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Claude(_) => "claude",
            Provider::OpenAi(_) => "openai",
            Provider::Fake(_) => "fake",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Claude(client) => &client.model,
            Provider::OpenAi(client) => &client.model,
            Provider::Fake(_) => "fake-model",
        }
    }
}

/// Pick the active provider by key availability: Claude first, then OpenAI.
/// Keys come from config, falling back to the conventional env variables.
/// Returns None when no key is configured; callers then rely on the
/// deterministic fallback writer.
pub fn select_provider(config: &ProviderConfig) -> Option<Provider> {
    let claude_key = config
        .claude_api_key
        .clone()
        .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
        .filter(|k| !k.trim().is_empty());
    if let Some(key) = claude_key {
        info!("Active provider: claude [{}]", config.claude_model);
        return Some(Provider::Claude(ClaudeClient::new(
            key,
            config.claude_model.clone(),
            config.claude_endpoint.clone(),
            config.timeout_secs,
        )));
    }

    let openai_key = config
        .openai_api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|k| !k.trim().is_empty());
    if let Some(key) = openai_key {
        info!("Active provider: openai [{}]", config.openai_model);
        return Some(Provider::OpenAi(OpenAiClient::new(
            key,
            config.openai_model.clone(),
            config.openai_endpoint.clone(),
            config.timeout_secs,
        )));
    }

    info!("No provider key configured; generation will use the template fallback");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::RateLimited("slow down".into()).is_retryable());
        assert!(!ProviderError::QuotaExhausted("billing".into()).is_retryable());
        assert!(!ProviderError::Auth("bad key".into()).is_retryable());
        assert!(!ProviderError::Http("500".into()).is_retryable());
        assert!(!ProviderError::Timeout(120).is_retryable());
    }

    #[test]
    fn test_openai_quota_vs_rate_limit() {
        let quota_body = r#"{"error": {"message": "You exceeded your current quota",
            "type": "insufficient_quota", "code": "insufficient_quota"}}"#;
        let err = classify_openai_error(StatusCode::TOO_MANY_REQUESTS, quota_body);
        assert!(matches!(err, ProviderError::QuotaExhausted(_)));

        let rate_body = r#"{"error": {"message": "Rate limit reached",
            "type": "requests", "code": "rate_limit_exceeded"}}"#;
        let err = classify_openai_error(StatusCode::TOO_MANY_REQUESTS, rate_body);
        assert!(matches!(err, ProviderError::RateLimited(_)));
    }

    #[test]
    fn test_openai_auth_error() {
        let body = r#"{"error": {"message": "Incorrect API key", "type": "invalid_request_error"}}"#;
        let err = classify_openai_error(StatusCode::UNAUTHORIZED, body);
        assert!(matches!(err, ProviderError::Auth(_)));
    }

    #[test]
    fn test_claude_rate_limit_and_overload() {
        let body = r#"{"error": {"message": "Too many requests", "type": "rate_limit_error"}}"#;
        let err = classify_claude_error(StatusCode::TOO_MANY_REQUESTS, body);
        assert!(matches!(err, ProviderError::RateLimited(_)));

        let overloaded = r#"{"error": {"message": "Overloaded", "type": "overloaded_error"}}"#;
        let err = classify_claude_error(StatusCode::from_u16(529).unwrap(), overloaded);
        assert!(matches!(err, ProviderError::RateLimited(_)));
    }

    #[test]
    fn test_classification_survives_garbage_body() {
        let err = classify_openai_error(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert!(matches!(err, ProviderError::Http(_)));
    }

    #[tokio::test]
    async fn test_fake_client_scripted_responses() {
        let client = FakeClient::new(vec![
            Ok("first".to_string()),
            Err(ProviderError::RateLimited("busy".into())),
            Ok("third".to_string()),
        ]);
        let params = CompletionParams::default();

        assert_eq!(client.complete("p", &params).await.unwrap(), "first");
        assert!(client.complete("p", &params).await.is_err());
        assert_eq!(client.complete("p", &params).await.unwrap(), "third");
        // Script exhausted down to one entry: it repeats
        assert_eq!(client.complete("p", &params).await.unwrap(), "third");
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn test_provider_union_dispatch() {
        let provider = Provider::Fake(FakeClient::always_text("generated body"));
        let out = provider
            .complete("prompt", &CompletionParams::default())
            .await
            .unwrap();
        assert_eq!(out, "generated body");
        assert_eq!(provider.name(), "fake");
    }

    #[test]
    fn test_select_provider_prefers_claude() {
        let config = ProviderConfig {
            claude_api_key: Some("ck".into()),
            openai_api_key: Some("ok".into()),
            ..ProviderConfig::default()
        };
        let provider = select_provider(&config).unwrap();
        assert_eq!(provider.name(), "claude");
    }

    #[test]
    fn test_select_provider_falls_through_to_openai() {
        let config = ProviderConfig {
            claude_api_key: None,
            openai_api_key: Some("ok".into()),
            ..ProviderConfig::default()
        };
        // Guard against an ambient key making this test environment-dependent
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            return;
        }
        let provider = select_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
