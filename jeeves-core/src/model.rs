//! Shared data models for Jeeves.
//!
//! This module contains types used across the application for
//! requests, responses, and internal data structures.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How an answer was produced.
///
/// Callers use this to render "live answer", "cached answer" and
/// "fallback answer" distinctly; a fallback is never silently
/// indistinguishable from a genuine backend answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Fresh response from the backend
    Live,
    /// Served from the response cache without an outbound call
    Cached,
    /// Deterministic fallback text; the backend could not answer
    Fallback,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Live => "live",
            AnswerSource::Cached => "cached",
            AnswerSource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for the gateway to answer
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerRequest {
    /// The prompt to answer
    pub prompt: String,

    /// Model to use (falls back to the configured default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Maximum tokens in the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Language code to localize a fallback answer into;
    /// detected from the prompt when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_lang: Option<String>,
}

impl AnswerRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            max_tokens: None,
            temperature: None,
            target_lang: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_target_lang(mut self, lang: impl Into<String>) -> Self {
        self.target_lang = Some(lang.into());
        self
    }
}

/// An answer produced by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerResponse {
    /// Response id ("ans-<uuid>")
    pub id: String,

    /// The answer text
    pub text: String,

    /// Model the answer was produced with (or requested from,
    /// for fallback answers)
    pub model: String,

    /// How the answer was produced
    pub source: AnswerSource,

    /// Number of outbound call attempts made (0 for cache hits)
    pub attempts: u32,
}

impl AnswerResponse {
    pub fn is_fallback(&self) -> bool {
        self.source == AnswerSource::Fallback
    }

    pub fn is_cached(&self) -> bool {
        self.source == AnswerSource::Cached
    }
}

/// Gateway status response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub backend_reachable: bool,
    pub model: String,
    pub cache_enabled: bool,
    pub fallback_enabled: bool,
    pub requests_today: u32,
    pub live_today: u32,
    pub cached_today: u32,
    pub fallback_today: u32,
    pub approx_input_tokens_today: u32,
    pub approx_output_tokens_today: u32,
    pub last_error: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend_reachable: bool,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorDetail {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
                code: None,
            },
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error.code = Some(code.into());
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(message, "invalid_request_error")
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(message, "backend_unavailable").with_code("backend_unavailable")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(message, "internal_error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_source_serialization() {
        assert_eq!(
            serde_json::to_string(&AnswerSource::Live).unwrap(),
            "\"live\""
        );
        assert_eq!(
            serde_json::to_string(&AnswerSource::Fallback).unwrap(),
            "\"fallback\""
        );
        assert_eq!(AnswerSource::Cached.to_string(), "cached");
    }

    #[test]
    fn test_answer_request_builder() {
        let req = AnswerRequest::new("Hello")
            .with_model("gpt-4o-mini")
            .with_temperature(0.2)
            .with_target_lang("es");

        assert_eq!(req.prompt, "Hello");
        assert_eq!(req.model, Some("gpt-4o-mini".to_string()));
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.target_lang, Some("es".to_string()));
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::backend_unavailable("all retries exhausted");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("backend_unavailable"));
        assert!(json.contains("all retries exhausted"));
    }
}
