//! Configuration management for Jeeves.
//!
//! Configuration is loaded in order of precedence:
//! 1. Defaults
//! 2. Config file (~/.jeeves/config.toml)
//! 3. Environment variables
//! 4. CLI flags (handled at CLI layer)
//!
//! The loaded configuration is validated once and then immutable for the
//! process lifetime; changing it requires a restart.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Backend (LLM provider) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of an OpenAI-compatible API
    /// (hosted provider or a locally-run inference server)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; local servers usually accept any value
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default model to request
    #[serde(default = "default_model")]
    pub model: String,

    /// Default maximum tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Default sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Gateway (rate limiting, retry, cache, fallback) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Maximum number of retries after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in seconds for exponential backoff between retries
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,

    /// Minimum interval in seconds between outbound backend calls
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay: f64,

    /// Cache entry time-to-live in seconds
    #[serde(default = "default_cache_expire_time")]
    pub cache_expire_time: u64,

    /// Whether response caching is enabled
    #[serde(default = "default_enable_cache")]
    pub enable_cache: bool,

    /// Whether fallback answers are returned when the backend fails
    #[serde(default = "default_enable_fallback")]
    pub enable_fallback: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    2.0
}

fn default_rate_limit_delay() -> f64 {
    1.0
}

fn default_cache_expire_time() -> u64 {
    3600
}

fn default_enable_cache() -> bool {
    true
}

fn default_enable_fallback() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            rate_limit_delay: default_rate_limit_delay(),
            cache_expire_time: default_cache_expire_time(),
            enable_cache: default_enable_cache(),
            enable_fallback: default_enable_fallback(),
        }
    }
}

impl GatewayConfig {
    /// Base retry delay as a `Duration`
    pub fn base_retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay.max(0.0))
    }

    /// Minimum interval between outbound calls as a `Duration`
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay.max(0.0))
    }

    /// Cache TTL as a `Duration`
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_expire_time)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    11440
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Translation service configuration
///
/// Used only to localize fallback answers; a missing or broken
/// translation endpoint never fails a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Whether fallback localization is enabled
    #[serde(default = "default_translation_enabled")]
    pub enabled: bool,

    /// Base URL of a LibreTranslate-compatible endpoint
    #[serde(default = "default_translation_endpoint")]
    pub endpoint: String,
}

fn default_translation_enabled() -> bool {
    true
}

fn default_translation_endpoint() -> String {
    "http://localhost:5000".to_string()
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: default_translation_enabled(),
            endpoint: default_translation_endpoint(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Returns the default Jeeves configuration directory (~/.jeeves)
    pub fn jeeves_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".jeeves"))
    }

    /// Returns the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        Self::jeeves_dir().map(|d| d.join("config.toml"))
    }

    /// Returns the default usage database path
    pub fn default_db_path() -> Option<PathBuf> {
        Self::jeeves_dir().map(|d| d.join("usage.db"))
    }

    /// Load configuration from the default path with environment
    /// overrides, validating the result
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = Self::default_config_path() {
            if path.exists() {
                Self::load_from_file(&path)?
            } else {
                Config::default()
            }
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file (no validation)
    pub fn load_from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("JEEVES_BASE_URL") {
            self.backend.base_url = url;
        }

        if let Ok(key) = std::env::var("JEEVES_API_KEY") {
            self.backend.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("JEEVES_MODEL") {
            self.backend.model = model;
        }

        if let Ok(retries) = std::env::var("JEEVES_MAX_RETRIES") {
            if let Ok(retries) = retries.parse() {
                self.gateway.max_retries = retries;
            }
        }

        if let Ok(delay) = std::env::var("JEEVES_RETRY_DELAY") {
            if let Ok(delay) = delay.parse() {
                self.gateway.retry_delay = delay;
            }
        }

        if let Ok(delay) = std::env::var("JEEVES_RATE_LIMIT_DELAY") {
            if let Ok(delay) = delay.parse() {
                self.gateway.rate_limit_delay = delay;
            }
        }

        if let Ok(ttl) = std::env::var("JEEVES_CACHE_EXPIRE_TIME") {
            if let Ok(ttl) = ttl.parse() {
                self.gateway.cache_expire_time = ttl;
            }
        }

        if let Ok(enabled) = std::env::var("JEEVES_ENABLE_CACHE") {
            self.gateway.enable_cache = parse_bool(&enabled);
        }

        if let Ok(enabled) = std::env::var("JEEVES_ENABLE_FALLBACK") {
            self.gateway.enable_fallback = parse_bool(&enabled);
        }

        if let Ok(enabled) = std::env::var("JEEVES_ENABLE_TRANSLATION") {
            self.translation.enabled = parse_bool(&enabled);
        }

        if let Ok(port) = std::env::var("JEEVES_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(host) = std::env::var("JEEVES_HOST") {
            self.server.host = host;
        }

        if let Ok(level) = std::env::var("JEEVES_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate the configuration.
    ///
    /// Out-of-range values (negative delays, zero TTL) are rejected
    /// here at startup rather than silently clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.base_url must not be empty".to_string(),
            ));
        }

        if self.backend.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "backend.max_tokens must be at least 1".to_string(),
            ));
        }

        if !self.backend.temperature.is_finite() || self.backend.temperature < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "backend.temperature must be a non-negative number, got {}",
                self.backend.temperature
            )));
        }

        if !self.gateway.retry_delay.is_finite() || self.gateway.retry_delay < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "gateway.retry_delay must be a non-negative number of seconds, got {}",
                self.gateway.retry_delay
            )));
        }

        if !self.gateway.rate_limit_delay.is_finite() || self.gateway.rate_limit_delay < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "gateway.rate_limit_delay must be a non-negative number of seconds, got {}",
                self.gateway.rate_limit_delay
            )));
        }

        if self.gateway.cache_expire_time == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.cache_expire_time must be at least 1 second".to_string(),
            ));
        }

        if self.translation.enabled && self.translation.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "translation.endpoint must not be empty when translation is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(path) = Self::default_config_path() {
            self.save_to_file(&path)
        } else {
            Err(ConfigError::ValidationError(
                "Could not determine config path".to_string(),
            ))
        }
    }

    /// Save configuration to a specific file
    pub fn save_to_file(&self, path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Get the server URL
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server.host, self.server.port)
    }

    /// Ensure the Jeeves directory exists
    pub fn ensure_dirs() -> std::io::Result<()> {
        if let Some(jeeves_dir) = Self::jeeves_dir() {
            std::fs::create_dir_all(&jeeves_dir)?;
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    value.to_lowercase() == "true" || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.base_url, "http://localhost:8080/v1");
        assert_eq!(config.backend.model, "gpt-3.5-turbo");
        assert_eq!(config.backend.max_tokens, 1000);
        assert_eq!(config.gateway.max_retries, 3);
        assert_eq!(config.gateway.retry_delay, 2.0);
        assert_eq!(config.gateway.rate_limit_delay, 1.0);
        assert_eq!(config.gateway.cache_expire_time, 3600);
        assert!(config.gateway.enable_cache);
        assert!(config.gateway.enable_fallback);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 11440);
        assert!(config.translation.enabled);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.server.port, parsed.server.port);
        assert_eq!(config.gateway.max_retries, parsed.gateway.max_retries);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[gateway]
max_retries = 5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        // Custom value
        assert_eq!(config.gateway.max_retries, 5);
        // Defaults still applied
        assert_eq!(config.gateway.retry_delay, 2.0);
        assert_eq!(config.backend.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_validate_rejects_negative_retry_delay() {
        let mut config = Config::default();
        config.gateway.retry_delay = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = Config::default();
        config.gateway.cache_expire_time = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_allows_zero_rate_limit_delay() {
        // Zero interval disables the throttle; only negatives are rejected
        let mut config = Config::default();
        config.gateway.rate_limit_delay = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_base_url() {
        let mut config = Config::default();
        config.backend.base_url = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_gateway_durations() {
        let config = GatewayConfig::default();
        assert_eq!(config.base_retry_delay(), Duration::from_secs(2));
        assert_eq!(config.min_call_interval(), Duration::from_secs(1));
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
    }
}
