//! LLM backend client.
//!
//! This module defines the `Backend` trait the gateway calls through,
//! plus an implementation for any OpenAI-compatible HTTP API (hosted
//! provider or a locally-run inference server). Provider selection is
//! just a base-URL/key pair resolved from configuration at startup.

use crate::config::BackendConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur when calling the backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Network error reaching backend: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Whether the failure is worth retrying.
    ///
    /// Quota/rate-limit signals, transport failures and server-side
    /// errors are transient; auth failures and rejected requests are
    /// not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimited(_)
                | BackendError::Network(_)
                | BackendError::Server { .. }
        )
    }
}

/// A fully-resolved completion request.
///
/// The gateway fills model and generation parameters from its defaults
/// before the request reaches a backend, so every field is concrete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use
    pub model: String,

    /// The prompt to send
    pub prompt: String,

    /// Maximum tokens in response
    pub max_tokens: u32,

    /// Temperature for response generation
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Estimate input tokens (rough approximation: chars / 4)
    pub fn estimate_input_tokens(&self) -> u32 {
        (self.prompt.len() / 4) as u32
    }
}

/// A language-model backend the gateway can call.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Answer a single prompt.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;

    /// Cheap reachability probe; never issues a full completion.
    async fn is_reachable(&self) -> bool;

    /// Provider name for logs
    fn name(&self) -> &str {
        "backend"
    }
}

/// Client for any OpenAI-compatible chat completions API
pub struct OpenAiBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiBackend {
    /// Create a backend client from configuration
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionsBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessageBody<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessageBody<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Map an HTTP error status to a backend error
fn classify_status(status: u16, message: String) -> BackendError {
    match status {
        429 => BackendError::RateLimited(message),
        401 | 403 => BackendError::Authentication(message),
        s if s >= 500 => BackendError::Server { status: s, message },
        _ => BackendError::Rejected(message),
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    #[instrument(skip(self, request), fields(model = %request.model, prompt_len = request.prompt.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionsBody {
            model: &request.model,
            messages: vec![ChatMessageBody {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!("Calling backend at {}", url);

        let response = self.authorize(self.http.post(&url).json(&body)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), message));
        }

        let parsed: ChatCompletionsResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                BackendError::InvalidResponse("response contained no choices".to_string())
            })
    }

    async fn is_reachable(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        self.authorize(self.http.get(&url))
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, MockServer};

    fn backend_for(server: &MockServer) -> OpenAiBackend {
        let config = BackendConfig {
            base_url: server.url("/v1"),
            api_key: Some("test-key".to_string()),
            ..BackendConfig::default()
        };
        OpenAiBackend::new(&config).unwrap()
    }

    #[test]
    fn test_completion_request_builder() {
        let req = CompletionRequest::new("gpt-3.5-turbo", "Hello")
            .with_max_tokens(256)
            .with_temperature(0.1);

        assert_eq!(req.model, "gpt-3.5-turbo");
        assert_eq!(req.prompt, "Hello");
        assert_eq!(req.max_tokens, 256);
        assert_eq!(req.temperature, 0.1);
    }

    #[test]
    fn test_estimate_tokens() {
        let req = CompletionRequest::new("model", "This is a test prompt with some words");
        // ~40 chars / 4 = ~10 tokens
        assert!(req.estimate_input_tokens() >= 8 && req.estimate_input_tokens() <= 12);
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(429, String::new()),
            BackendError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(401, String::new()),
            BackendError::Authentication(_)
        ));
        assert!(matches!(
            classify_status(503, String::new()),
            BackendError::Server { status: 503, .. }
        ));
        assert!(matches!(
            classify_status(404, String::new()),
            BackendError::Rejected(_)
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(classify_status(429, String::new()).is_retryable());
        assert!(classify_status(500, String::new()).is_retryable());
        assert!(!classify_status(401, String::new()).is_retryable());
        assert!(!classify_status(400, String::new()).is_retryable());
        assert!(!BackendError::InvalidResponse("bad json".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn test_complete_posts_and_parses() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer test-key")
                    .body_includes("\"model\":\"gpt-3.5-turbo\"")
                    .body_includes("\"content\":\"ping\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        serde_json::json!({
                            "id": "chatcmpl-1",
                            "choices": [
                                { "index": 0, "message": { "role": "assistant", "content": "pong" } }
                            ]
                        })
                        .to_string(),
                    );
            })
            .await;

        let backend = backend_for(&server);
        let request = CompletionRequest::new("gpt-3.5-turbo", "ping");
        let text = backend.complete(&request).await.unwrap();

        assert_eq!(text, "pong");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_maps_rate_limit() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(429).body("quota exceeded");
            })
            .await;

        let backend = backend_for(&server);
        let request = CompletionRequest::new("gpt-3.5-turbo", "ping");
        let err = backend.complete(&request).await.unwrap_err();

        assert!(matches!(err, BackendError::RateLimited(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_complete_maps_auth_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(401).body("invalid api key");
            })
            .await;

        let backend = backend_for(&server);
        let request = CompletionRequest::new("gpt-3.5-turbo", "ping");
        let err = backend.complete(&request).await.unwrap_err();

        assert!(matches!(err, BackendError::Authentication(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(serde_json::json!({ "choices": [] }).to_string());
            })
            .await;

        let backend = backend_for(&server);
        let request = CompletionRequest::new("gpt-3.5-turbo", "ping");
        let err = backend.complete(&request).await.unwrap_err();

        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_is_reachable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/models");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(serde_json::json!({ "object": "list", "data": [] }).to_string());
            })
            .await;

        let backend = backend_for(&server);
        assert!(backend.is_reachable().await);
    }

    #[tokio::test]
    async fn test_is_reachable_reports_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/models");
                then.status(500);
            })
            .await;

        let backend = backend_for(&server);
        assert!(!backend.is_reachable().await);
    }
}
