//! Response cache with time-based expiry.
//!
//! Entries are looked up by cache key (request path plus normalized query).
//! Expired entries are evicted lazily on the next read; there is no sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::Result;

/// Default time-to-live for cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Entry stored in the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Last successful response payload.
    pub payload: Value,
    /// Instant after which the entry is no longer served.
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held, including expired ones not yet evicted.
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    /// Bumped by every [`ResponseCache::clear`].
    epoch: u64,
}

/// Shared response cache. Clones share state.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Arc<Mutex<CacheInner>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            ttl,
        }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live payload. An expired entry is removed and reported absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        match inner.entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                let payload = entry.payload.clone();
                inner.hits += 1;
                trace!(key = %key, "Cache hit");
                Some(payload)
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.misses += 1;
                debug!(key = %key, "Cache entry expired, evicted");
                None
            }
            None => {
                inner.misses += 1;
                trace!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// Store a payload, replacing any previous entry wholesale.
    pub fn set(&self, key: impl Into<String>, payload: Value) {
        let entry = self.entry(payload);
        let key = key.into();
        trace!(key = %key, "Cache set");
        self.inner.lock().entries.insert(key, entry);
    }

    /// Current clear epoch. Pair with [`ResponseCache::set_if_epoch`] to store
    /// a payload fetched before a possible clear.
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    /// Store a payload only if the cache has not been cleared since `epoch`
    /// was read. Returns whether it was stored.
    pub fn set_if_epoch(&self, key: impl Into<String>, payload: Value, epoch: u64) -> bool {
        let key = key.into();
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            debug!(key = %key, "Cache cleared while read was in flight, not storing");
            return false;
        }
        let entry = self.entry(payload);
        trace!(key = %key, "Cache set");
        inner.entries.insert(key, entry);
        true
    }

    fn entry(&self, payload: Value) -> CacheEntry {
        CacheEntry {
            payload,
            expires_at: Instant::now() + self.ttl,
        }
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().entries.remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.epoch += 1;
        debug!(count, "Cache cleared");
    }

    /// Remove every entry whose key matches `pattern`. Returns the count removed.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !pattern.is_match(key));
        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!(pattern = %pattern, removed, "Cache entries invalidated");
        }
        removed
    }

    /// Compile `pattern` and invalidate matching keys.
    pub fn invalidate_str(&self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)?;
        Ok(self.invalidate_pattern(&regex))
    }

    /// Peek at the raw entry without evicting or counting.
    pub fn peek_entry(&self, key: &str) -> Option<CacheEntry> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Whether a raw entry exists, live or not.
    pub fn contains_raw(&self, key: &str) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_ttl_scenario() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.set("jobs:1", json!({"id": 1}));

        advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("jobs:1"), Some(json!({"id": 1})));

        advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("jobs:1"), None);
        assert!(!cache.contains_raw("jobs:1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_instant_is_exclusive() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        cache.set("k", json!(1));

        advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_replaces_and_resets_expiry() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        cache.set("k", json!("old"));
        advance(Duration::from_secs(8)).await;
        cache.set("k", json!("new"));
        advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get("k"), Some(json!("new")));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = ResponseCache::default();
        cache.set("a", json!(1));
        cache.set("b", json!(2));

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_if_epoch_skips_after_clear() {
        let cache = ResponseCache::default();
        let epoch = cache.epoch();
        assert!(cache.set_if_epoch("/api/auth/jobs", json!([1]), epoch));

        let stale = cache.epoch();
        cache.clear();
        assert!(!cache.set_if_epoch("/api/auth/jobs", json!(["stale"]), stale));
        assert!(cache.is_empty());

        assert!(cache.set_if_epoch("/api/auth/jobs", json!([2]), cache.epoch()));
        assert_eq!(cache.get("/api/auth/jobs"), Some(json!([2])));
    }

    #[test]
    fn test_invalidate_pattern() {
        let cache = ResponseCache::default();
        cache.set("/api/auth/customers", json!([]));
        cache.set("/api/auth/customers/42", json!({}));
        cache.set("/api/auth/customers?page=2", json!([]));
        cache.set("/api/auth/jobs", json!([]));

        let removed = cache.invalidate_str("^/api/auth/customers").unwrap();
        assert_eq!(removed, 3);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("/api/auth/jobs").is_some());
    }

    #[test]
    fn test_invalid_pattern_errors() {
        let cache = ResponseCache::default();
        assert!(cache.invalidate_str("(unclosed").is_err());
    }

    #[test]
    fn test_stats_counts() {
        let cache = ResponseCache::default();
        cache.set("a", json!(1));
        let _ = cache.get("a");
        let _ = cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_clones_share_state() {
        let cache = ResponseCache::default();
        let other = cache.clone();
        cache.set("a", json!(1));
        assert_eq!(other.get("a"), Some(json!(1)));
    }
}
