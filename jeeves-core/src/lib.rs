//! # Jeeves Core
//!
//! Core library for Jeeves - a quota-aware request gateway for LLM backends.
//!
//! This crate provides:
//! - Configuration management
//! - An OpenAI-compatible backend client behind the `Backend` trait
//! - The request gateway: response caching, a global call throttle,
//!   retry with exponential backoff, and fallback answers
//! - Fallback localization via an external translation service
//! - Usage tracking (SQLite)
//! - HTTP API server
//! - Shared data models

pub mod backend;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod model;
pub mod server;
pub mod translate;
pub mod usage;

pub use backend::{Backend, BackendError, CompletionRequest, OpenAiBackend};
pub use config::{Config, ConfigError, GatewayConfig};
pub use gateway::{Gateway, GatewayError};
pub use model::{AnswerRequest, AnswerResponse, AnswerSource};
pub use translate::{TranslationError, Translator};
pub use usage::{UsageError, UsageEvent, UsageLog, UsageStats};
