//! Response cache.
//!
//! TTL-based in-memory cache keyed by a digest of the normalized
//! request. Eviction is passive: an entry past its TTL is treated as
//! absent on lookup and overwritten by the next write to the same key.

use crate::backend::CompletionRequest;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Deterministic digest of a normalized request.
///
/// Covers the trimmed prompt, the resolved model and the resolved
/// generation parameters, so the same prompt with different parameters
/// never collides. Never exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn for_request(request: &CompletionRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(request.model.as_bytes());
        hasher.update([0u8]);
        hasher.update(request.prompt.trim().as_bytes());
        hasher.update([0u8]);
        hasher.update(request.max_tokens.to_be_bytes());
        hasher.update(request.temperature.to_bits().to_be_bytes());
        Self(hasher.finalize().into())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    text: String,
    created_at: Instant,
}

/// In-memory response cache with a fixed TTL
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Look up a fresh entry.
    ///
    /// Entries older than the TTL are treated as absent but left in
    /// place; the next write to the same key replaces them.
    pub fn get(&self, key: &CacheKey, now: Instant) -> Option<String> {
        let entry = self.entries.get(key)?;
        if now.duration_since(entry.created_at) > self.ttl {
            return None;
        }
        Some(entry.text.clone())
    }

    /// Store a response, replacing any previous entry for the key
    pub fn insert(&mut self, key: CacheKey, text: String, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                text,
                created_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest::new("gpt-3.5-turbo", prompt)
    }

    #[test]
    fn test_key_is_deterministic() {
        let key1 = CacheKey::for_request(&request("Hello"));
        let key2 = CacheKey::for_request(&request("Hello"));
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_normalizes_whitespace() {
        let key1 = CacheKey::for_request(&request("Hello"));
        let key2 = CacheKey::for_request(&request("  Hello  \n"));
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_varies_with_content_and_parameters() {
        let base = CacheKey::for_request(&request("Hello"));

        assert_ne!(base, CacheKey::for_request(&request("Goodbye")));
        assert_ne!(
            base,
            CacheKey::for_request(&request("Hello").with_temperature(0.2))
        );
        assert_ne!(
            base,
            CacheKey::for_request(&request("Hello").with_max_tokens(64))
        );
        assert_ne!(
            base,
            CacheKey::for_request(&CompletionRequest::new("gpt-4o-mini", "Hello"))
        );
    }

    #[tokio::test]
    async fn test_hit_and_miss() {
        let now = Instant::now();
        let mut cache = ResponseCache::new(Duration::from_secs(3600));
        let key = CacheKey::for_request(&request("ping"));

        assert!(cache.get(&key, now).is_none());

        cache.insert(key, "pong".to_string(), now);
        assert_eq!(cache.get(&key, now).as_deref(), Some("pong"));

        let other = CacheKey::for_request(&request("other"));
        assert!(cache.get(&other, now).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_absent() {
        let mut cache = ResponseCache::new(Duration::from_secs(3600));
        let key = CacheKey::for_request(&request("ping"));

        cache.insert(key, "pong".to_string(), Instant::now());

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert_eq!(cache.get(&key, Instant::now()).as_deref(), Some("pong"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(&key, Instant::now()).is_none());

        // Entry is still present and gets replaced by the next write
        assert_eq!(cache.len(), 1);
        cache.insert(key, "pong2".to_string(), Instant::now());
        assert_eq!(cache.get(&key, Instant::now()).as_deref(), Some("pong2"));
        assert_eq!(cache.len(), 1);
    }
}
