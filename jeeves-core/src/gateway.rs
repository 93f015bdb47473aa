//! Quota-aware request gateway.
//!
//! Wraps a [`Backend`] behind a single `answer()` operation that hides
//! backend quota limits, transient failures and unavailability from
//! callers: a TTL response cache, a global throttle spacing outbound
//! calls, retry with capped exponential backoff, and deterministic
//! fallback answers.

use crate::backend::{Backend, BackendError, CompletionRequest};
use crate::cache::{CacheKey, ResponseCache};
use crate::config::{BackendConfig, GatewayConfig};
use crate::model::{AnswerRequest, AnswerResponse, AnswerSource};
use crate::translate::Translator;
use crate::usage::{UsageEvent, UsageLog};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

/// Ceiling for a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Errors surfaced to gateway callers
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend unavailable after {attempts} attempts: {last_error}")]
    BackendUnavailable {
        attempts: u32,
        last_error: BackendError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Record of one outbound call attempt
#[derive(Debug)]
pub struct CallAttempt {
    /// Zero-based attempt index
    pub index: u32,
    /// Backoff delay served before this attempt
    pub delay: Duration,
    pub outcome: AttemptOutcome,
}

#[derive(Debug)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure(String),
    FatalFailure(String),
}

enum Failure {
    Exhausted(BackendError),
    Fatal(BackendError),
}

impl Failure {
    fn into_error(self) -> BackendError {
        match self {
            Failure::Exhausted(e) | Failure::Fatal(e) => e,
        }
    }
}

/// Global gate spacing out outbound call starts.
///
/// Passing the gate reserves the next start slot one interval ahead; a
/// finished call pushes the slot to `end + interval` if that is later.
/// Sequential traffic therefore never starts a call within the interval
/// after the previous one returned, while a slow in-flight call does
/// not serialize everyone behind it. Waiting happens with the lock
/// released so cache lookups and other callers proceed concurrently,
/// and a dropped waiter leaves no trace in shared state.
#[derive(Debug)]
struct Throttle {
    min_interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl Throttle {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        loop {
            let wait = {
                let mut next_allowed = self.next_allowed.lock().await;
                let now = Instant::now();
                match *next_allowed {
                    Some(at) if at > now => at - now,
                    _ => {
                        *next_allowed = Some(now + self.min_interval);
                        return;
                    }
                }
            };

            tokio::time::sleep(wait).await;
        }
    }

    async fn on_call_finished(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut next_allowed = self.next_allowed.lock().await;
        let candidate = Instant::now() + self.min_interval;
        if next_allowed.map_or(true, |at| candidate > at) {
            *next_allowed = Some(candidate);
        }
    }
}

/// The quota-aware request gateway
pub struct Gateway {
    backend: Arc<dyn Backend>,
    defaults: BackendConfig,
    config: GatewayConfig,
    cache: RwLock<ResponseCache>,
    throttle: Throttle,
    translator: Option<Translator>,
    usage: Option<Arc<UsageLog>>,
}

impl Gateway {
    /// Create a gateway over a backend.
    ///
    /// `defaults` supplies the model and generation parameters applied
    /// to requests that leave them unset; `config` must already have
    /// been validated at startup and is immutable for the gateway's
    /// lifetime.
    pub fn new(backend: Arc<dyn Backend>, defaults: BackendConfig, config: GatewayConfig) -> Self {
        let cache = RwLock::new(ResponseCache::new(config.cache_ttl()));
        let throttle = Throttle::new(config.min_call_interval());

        Self {
            backend,
            defaults,
            config,
            cache,
            throttle,
            translator: None,
            usage: None,
        }
    }

    /// Attach a translation client used to localize fallback answers
    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Attach a usage log recording one event per answered request
    pub fn with_usage_log(mut self, usage: Arc<UsageLog>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn default_model(&self) -> &str {
        &self.defaults.model
    }

    /// Cheap availability probe for status displays; never issues a
    /// full request
    pub async fn is_backend_reachable(&self) -> bool {
        self.backend.is_reachable().await
    }

    /// Answer a prompt.
    ///
    /// Fast path: a fresh cache entry is returned without touching the
    /// throttle or the backend. Otherwise the request goes through the
    /// throttle and the retry loop; when the backend cannot answer and
    /// fallback is enabled, a deterministic fallback answer is returned
    /// instead of an error, flagged via [`AnswerSource::Fallback`].
    #[instrument(skip(self, request), fields(prompt_len = request.prompt.len()))]
    pub async fn answer(&self, request: &AnswerRequest) -> Result<AnswerResponse, GatewayError> {
        if request.prompt.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }

        let call = self.resolve(request);
        let key = CacheKey::for_request(&call);

        if self.config.enable_cache {
            let cached = {
                let cache = self.cache.read().await;
                cache.get(&key, Instant::now())
            };
            if let Some(text) = cached {
                debug!("Cache hit, serving stored response");
                let response = build_response(text, &call.model, AnswerSource::Cached, 0);
                self.record_usage(&call, AnswerSource::Cached, response.text.len(), 0, None)
                    .await;
                return Ok(response);
            }
        }

        let mut attempts: Vec<CallAttempt> = Vec::new();
        let mut delay = Duration::ZERO;

        let failure = loop {
            let index = attempts.len() as u32;

            self.throttle.acquire().await;
            let result = self.backend.complete(&call).await;
            self.throttle.on_call_finished().await;

            match result {
                Ok(text) => {
                    attempts.push(CallAttempt {
                        index,
                        delay,
                        outcome: AttemptOutcome::Success,
                    });

                    if self.config.enable_cache {
                        let mut cache = self.cache.write().await;
                        cache.insert(key, text.clone(), Instant::now());
                    }

                    let total = attempts.len() as u32;
                    let response = build_response(text, &call.model, AnswerSource::Live, total);
                    self.record_usage(&call, AnswerSource::Live, response.text.len(), total, None)
                        .await;
                    return Ok(response);
                }
                Err(e) if e.is_retryable() => {
                    attempts.push(CallAttempt {
                        index,
                        delay,
                        outcome: AttemptOutcome::RetryableFailure(e.to_string()),
                    });

                    if index < self.config.max_retries {
                        delay = backoff_delay(self.config.base_retry_delay(), index);
                        warn!(
                            attempt = index + 1,
                            delay_ms = delay.as_millis() as u64,
                            "Retryable backend failure: {}",
                            e
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        break Failure::Exhausted(e);
                    }
                }
                Err(e) => {
                    attempts.push(CallAttempt {
                        index,
                        delay,
                        outcome: AttemptOutcome::FatalFailure(e.to_string()),
                    });
                    break Failure::Fatal(e);
                }
            }
        };

        let total = attempts.len() as u32;
        debug!(?attempts, "Backend gave no answer");

        if self.config.enable_fallback {
            let cause = failure.into_error();
            let text = self.fallback_text(request).await;
            let response = build_response(text, &call.model, AnswerSource::Fallback, total);
            self.record_usage(
                &call,
                AnswerSource::Fallback,
                response.text.len(),
                total,
                Some(cause.to_string()),
            )
            .await;
            return Ok(response);
        }

        let error = match failure {
            Failure::Exhausted(e) => GatewayError::BackendUnavailable {
                attempts: total,
                last_error: e,
            },
            Failure::Fatal(e) => GatewayError::Backend(e),
        };
        self.record_usage(&call, AnswerSource::Live, 0, total, Some(error.to_string()))
            .await;
        Err(error)
    }

    /// Resolve a caller request into a concrete backend call, filling
    /// unset fields from the configured defaults
    fn resolve(&self, request: &AnswerRequest) -> CompletionRequest {
        CompletionRequest::new(
            request
                .model
                .clone()
                .unwrap_or_else(|| self.defaults.model.clone()),
            request.prompt.trim(),
        )
        .with_max_tokens(request.max_tokens.unwrap_or(self.defaults.max_tokens))
        .with_temperature(request.temperature.unwrap_or(self.defaults.temperature))
    }

    /// Deterministic fallback answer, localized best-effort.
    ///
    /// Translation failures leave the message untranslated; they never
    /// propagate to the caller.
    async fn fallback_text(&self, request: &AnswerRequest) -> String {
        let prompt = request.prompt.trim();
        let message = format!(
            "The assistant is currently unavailable. Your question \"{}\" could not be \
             answered right now; please try again in a few minutes.",
            prompt
        );

        let Some(translator) = &self.translator else {
            return message;
        };

        let target = match &request.target_lang {
            Some(lang) => lang.clone(),
            None => match translator.detect_language(prompt).await {
                Ok(lang) => lang,
                Err(e) => {
                    debug!("Language detection failed, serving fallback untranslated: {}", e);
                    return message;
                }
            },
        };

        if target == "en" {
            return message;
        }

        match translator.translate(&message, &target).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!("Translation failed, serving fallback untranslated: {}", e);
                message
            }
        }
    }

    async fn record_usage(
        &self,
        call: &CompletionRequest,
        source: AnswerSource,
        response_chars: usize,
        attempts: u32,
        error_code: Option<String>,
    ) {
        let Some(usage) = &self.usage else { return };

        let mut event = UsageEvent::new(
            &call.model,
            source,
            call.prompt.len(),
            response_chars,
            attempts,
            true,
        );
        if let Some(code) = error_code {
            event = event.with_error(code);
        }

        if let Err(e) = usage.record(event).await {
            error!("Failed to record usage event: {}", e);
        }
    }
}

fn build_response(text: String, model: &str, source: AnswerSource, attempts: u32) -> AnswerResponse {
    AnswerResponse {
        id: format!("ans-{}", Uuid::new_v4()),
        text,
        model: model.to_string(),
        source,
        attempts,
    }
}

/// Backoff delay after the failure of the attempt at `attempt_index`,
/// capped to avoid unbounded waits
fn backoff_delay(base: Duration, attempt_index: u32) -> Duration {
    let factor = 1u32 << attempt_index.min(16);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}
