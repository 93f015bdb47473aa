//! Usage tracking.
//!
//! SQLite-based log of gateway requests: one row per `answer()`, with
//! the answer source (live/cached/fallback), attempt count and rough
//! token estimates. Purely observational; the gateway's throttle is
//! the only thing that gates outbound calls.

use crate::model::AnswerSource;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Errors related to usage tracking
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Failed to initialize database: {0}")]
    InitializationError(String),
}

/// A usage event recorded in the database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageEvent {
    #[serde(default)]
    pub id: Option<i64>,
    pub timestamp: String,
    pub model: String,
    pub source: String,
    pub prompt_chars: i32,
    pub response_chars: i32,
    pub approx_input_tokens: i32,
    pub approx_output_tokens: i32,
    pub attempts: i32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl UsageEvent {
    /// Create a new usage event
    pub fn new(
        model: impl Into<String>,
        source: AnswerSource,
        prompt_chars: usize,
        response_chars: usize,
        attempts: u32,
        success: bool,
    ) -> Self {
        let prompt_chars = prompt_chars as i32;
        let response_chars = response_chars as i32;

        Self {
            id: None,
            timestamp: Utc::now().to_rfc3339(),
            model: model.into(),
            source: source.as_str().to_string(),
            prompt_chars,
            response_chars,
            approx_input_tokens: prompt_chars / 4,
            approx_output_tokens: response_chars / 4,
            attempts: attempts as i32,
            success,
            error_code: None,
        }
    }

    /// Add an error code to the event
    pub fn with_error(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self.success = false;
        self
    }
}

/// Usage statistics since UTC midnight
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub requests_today: u32,
    pub live_today: u32,
    pub cached_today: u32,
    pub fallback_today: u32,
    pub approx_input_tokens_today: u32,
    pub approx_output_tokens_today: u32,
    pub last_error: Option<String>,
}

/// Records and queries gateway usage
pub struct UsageLog {
    pool: SqlitePool,
    last_error: Arc<RwLock<Option<String>>>,
}

impl UsageLog {
    /// Initialize the usage log with a database at the given path
    #[instrument(skip_all)]
    pub async fn new(db_path: &Path) -> Result<Self, UsageError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                UsageError::InitializationError(format!("Failed to create directory: {}", e))
            })?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        debug!("Connecting to SQLite database at: {}", db_path.display());
        let pool = SqlitePool::connect(&db_url).await?;

        Self::init_schema(&pool).await?;

        info!("Usage log initialized successfully");

        Ok(Self {
            pool,
            last_error: Arc::new(RwLock::new(None)),
        })
    }

    /// Initialize the database schema
    async fn init_schema(pool: &SqlitePool) -> Result<(), UsageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                model TEXT NOT NULL,
                source TEXT NOT NULL,
                prompt_chars INTEGER NOT NULL,
                response_chars INTEGER NOT NULL,
                approx_input_tokens INTEGER NOT NULL,
                approx_output_tokens INTEGER NOT NULL,
                attempts INTEGER NOT NULL,
                success BOOLEAN NOT NULL,
                error_code TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_usage_timestamp
            ON usage_events(timestamp)
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Record a usage event
    #[instrument(skip(self, event))]
    pub async fn record(&self, event: UsageEvent) -> Result<i64, UsageError> {
        // Update last error if this was a failure
        if !event.success {
            let mut last_error = self.last_error.write().await;
            *last_error = event.error_code.clone();
        }

        let result = sqlx::query(
            r#"
            INSERT INTO usage_events
                (timestamp, model, source, prompt_chars, response_chars,
                 approx_input_tokens, approx_output_tokens, attempts, success, error_code)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.timestamp)
        .bind(&event.model)
        .bind(&event.source)
        .bind(event.prompt_chars)
        .bind(event.response_chars)
        .bind(event.approx_input_tokens)
        .bind(event.approx_output_tokens)
        .bind(event.attempts)
        .bind(event.success)
        .bind(&event.error_code)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Recorded usage event with id: {}", id);

        Ok(id)
    }

    /// Get recent usage events
    pub async fn recent(&self, limit: u32) -> Result<Vec<UsageEvent>, UsageError> {
        let events = sqlx::query_as::<_, UsageEvent>(
            r#"
            SELECT id, timestamp, model, source, prompt_chars, response_chars,
                   approx_input_tokens, approx_output_tokens, attempts, success, error_code
            FROM usage_events
            ORDER BY timestamp DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i32)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Get usage statistics since UTC midnight
    pub async fn stats(&self) -> Result<UsageStats, UsageError> {
        let since = today_start_utc();

        let counts: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT source, COUNT(*) FROM usage_events
            WHERE timestamp >= ?
            GROUP BY source
            "#,
        )
        .bind(&since)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = UsageStats::default();
        for (source, count) in counts {
            let count = count as u32;
            stats.requests_today += count;
            match source.as_str() {
                "live" => stats.live_today = count,
                "cached" => stats.cached_today = count,
                "fallback" => stats.fallback_today = count,
                _ => {}
            }
        }

        // Token estimates only cover live answers; cache hits and
        // fallbacks consume no backend tokens
        let tokens: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(approx_input_tokens), 0),
                COALESCE(SUM(approx_output_tokens), 0)
            FROM usage_events
            WHERE timestamp >= ? AND source = 'live'
            "#,
        )
        .bind(&since)
        .fetch_one(&self.pool)
        .await?;

        stats.approx_input_tokens_today = tokens.0 as u32;
        stats.approx_output_tokens_today = tokens.1 as u32;
        stats.last_error = self.last_error.read().await.clone();

        Ok(stats)
    }

    /// Clear all usage events (for testing)
    #[cfg(test)]
    pub async fn clear_all(&self) -> Result<(), UsageError> {
        sqlx::query("DELETE FROM usage_events")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// RFC 3339 timestamp for today's UTC midnight
fn today_start_utc() -> String {
    let now = Utc::now();
    now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn create_test_log() -> UsageLog {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        // We need to leak the tempdir to prevent cleanup during test
        let db_path_owned = db_path.to_path_buf();
        std::mem::forget(dir);

        UsageLog::new(&db_path_owned).await.unwrap()
    }

    #[tokio::test]
    async fn test_record_event() {
        let log = create_test_log().await;

        let event = UsageEvent::new("gpt-3.5-turbo", AnswerSource::Live, 100, 200, 1, true);
        let id = log.record(event).await.unwrap();

        assert!(id > 0);
    }

    #[tokio::test]
    async fn test_recent_events() {
        let log = create_test_log().await;
        log.clear_all().await.unwrap();

        for _ in 0..3 {
            let event = UsageEvent::new("gpt-3.5-turbo", AnswerSource::Live, 100, 200, 1, true);
            log.record(event).await.unwrap();
        }

        let events = log.recent(2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].source, "live");
        assert_eq!(events[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_stats_by_source() {
        let log = create_test_log().await;
        log.clear_all().await.unwrap();

        log.record(UsageEvent::new(
            "gpt-3.5-turbo",
            AnswerSource::Live,
            400,
            800,
            1,
            true,
        ))
        .await
        .unwrap();
        log.record(UsageEvent::new(
            "gpt-3.5-turbo",
            AnswerSource::Cached,
            400,
            800,
            0,
            true,
        ))
        .await
        .unwrap();
        log.record(
            UsageEvent::new("gpt-3.5-turbo", AnswerSource::Fallback, 100, 50, 4, true)
                .with_error("Backend rate limit exceeded"),
        )
        .await
        .unwrap();

        let stats = log.stats().await.unwrap();
        assert_eq!(stats.requests_today, 3);
        assert_eq!(stats.live_today, 1);
        assert_eq!(stats.cached_today, 1);
        assert_eq!(stats.fallback_today, 1);
        // Only the live answer counts towards token estimates
        assert_eq!(stats.approx_input_tokens_today, 100); // 400 / 4
        assert_eq!(stats.approx_output_tokens_today, 200); // 800 / 4
        assert_eq!(
            stats.last_error.as_deref(),
            Some("Backend rate limit exceeded")
        );
    }

    #[test]
    fn test_with_error_marks_failure() {
        let event = UsageEvent::new("m", AnswerSource::Fallback, 10, 0, 4, true)
            .with_error("quota exceeded");
        assert!(!event.success);
        assert_eq!(event.error_code.as_deref(), Some("quota exceeded"));
    }
}
