//! Fallback localization.
//!
//! Thin client for a LibreTranslate-compatible endpoint, used only to
//! localize fallback answers. The gateway swallows every error from
//! this module, so a missing or broken translation service never fails
//! a request.

use crate::config::TranslationConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from the translation endpoint
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Translation request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Translation endpoint returned status {0}")]
    Status(u16),

    #[error("Unexpected response from translation endpoint: {0}")]
    InvalidResponse(String),
}

#[derive(Serialize)]
struct TranslateBody<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Serialize)]
struct DetectBody<'a> {
    q: &'a str,
}

#[derive(Deserialize)]
struct DetectCandidate {
    language: String,
}

/// Client for a LibreTranslate-compatible translation service
pub struct Translator {
    http: reqwest::Client,
    endpoint: String,
}

impl Translator {
    pub fn new(config: &TranslationConfig) -> Result<Self, TranslationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Detect the language of a text, returning a code like "en"
    pub async fn detect_language(&self, text: &str) -> Result<String, TranslationError> {
        let url = format!("{}/detect", self.endpoint);
        let response = self.http.post(&url).json(&DetectBody { q: text }).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::Status(status.as_u16()));
        }

        let candidates: Vec<DetectCandidate> = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        candidates
            .into_iter()
            .next()
            .map(|candidate| candidate.language)
            .ok_or_else(|| {
                TranslationError::InvalidResponse("no language candidates returned".to_string())
            })
    }

    /// Translate a text into the target language
    pub async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslationError> {
        let url = format!("{}/translate", self.endpoint);
        let body = TranslateBody {
            q: text,
            source: "auto",
            target: target_lang,
            format: "text",
        };

        debug!("Translating {} chars into '{}'", text.len(), target_lang);

        let response = self.http.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::Status(status.as_u16()));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::InvalidResponse(e.to_string()))?;

        Ok(parsed.translated_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn translator_for(server: &MockServer) -> Translator {
        let config = TranslationConfig {
            enabled: true,
            endpoint: server.base_url(),
        };
        Translator::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_translate() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/translate")
                    .body_includes("\"target\":\"es\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        serde_json::json!({ "translatedText": "hola" }).to_string(),
                    );
            })
            .await;

        let translator = translator_for(&server);
        let text = translator.translate("hello", "es").await.unwrap();

        assert_eq!(text, "hola");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_detect_language() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/detect");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        serde_json::json!([
                            { "language": "pt", "confidence": 92.0 },
                            { "language": "es", "confidence": 41.0 }
                        ])
                        .to_string(),
                    );
            })
            .await;

        let translator = translator_for(&server);
        let lang = translator.detect_language("qual é a taxa de câmbio?").await.unwrap();

        assert_eq!(lang, "pt");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/translate");
                then.status(500);
            })
            .await;

        let translator = translator_for(&server);
        let err = translator.translate("hello", "es").await.unwrap_err();

        assert!(matches!(err, TranslationError::Status(500)));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/detect");
                then.status(200)
                    .header("content-type", "application/json")
                    .body("{}");
            })
            .await;

        let translator = translator_for(&server);
        let err = translator.detect_language("hello").await.unwrap_err();

        assert!(matches!(err, TranslationError::InvalidResponse(_)));
    }
}
