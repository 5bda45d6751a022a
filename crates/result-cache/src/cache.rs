//! TTL cache of processed output locations

use crate::types::{CacheEntry, CacheStats};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// A result cache keyed by processing key, storing artifact paths
///
/// At most one entry exists per key. Entries older than the TTL are treated
/// as absent by [`get`](Self::get) and removed by
/// [`evict_expired`](Self::evict_expired).
#[derive(Clone)]
pub struct ResultCache {
    /// In-memory entries
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    /// Maximum age of an entry
    ttl: TimeDelta,
    /// Cache hit counter
    hits: Arc<AtomicU64>,
    /// Cache miss counter
    misses: Arc<AtomicU64>,
    /// Expired entries removed so far
    evictions: Arc<AtomicU64>,
}

impl ResultCache {
    /// Create a new result cache with the given time-to-live
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.created_at > self.ttl
    }

    /// Look up the artifact path stored under `key`
    ///
    /// Returns `None` if the key is unknown or its entry has outlived the TTL.
    pub async fn get(&self, key: &str) -> Option<PathBuf> {
        let entry = {
            let entries = self.entries.read().await;
            entries.get(key).cloned()
        };

        match entry {
            Some(entry) if !self.is_expired(&entry, Utc::now()) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, path = ?entry.path, "Cache hit");
                Some(entry.path)
            }
            Some(entry) => {
                debug!(key = %key, created_at = %entry.created_at, "Cache entry expired");
                self.remove_if_expired(key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// Store `path` under `key`, replacing any previous entry
    pub async fn put(&self, key: &str, path: impl AsRef<Path>) {
        let entry = CacheEntry {
            path: path.as_ref().to_path_buf(),
            created_at: Utc::now(),
        };

        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
        debug!(key = %key, path = ?path.as_ref(), "Cached result");
    }

    /// Remove `key` only if it is still expired once the write lock is held
    async fn remove_if_expired(&self, key: &str) {
        let mut entries = self.entries.write().await;
        let expired = entries
            .get(key)
            .is_some_and(|e| self.is_expired(e, Utc::now()));
        if expired {
            entries.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Scan every entry and drop those older than the TTL
    ///
    /// Returns the number of entries removed.
    pub async fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - entries.len();

        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, remaining = entries.len(), "Evicted expired cache entries");
        }

        removed
    }

    /// Maximum age of an entry
    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no entries are stored
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            entries: entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn test_cache_put_and_get() {
        let cache = ResultCache::new(DAY);

        cache.put("abc_true_true", "./outputs/result_abc.png").await;

        let path = cache.get("abc_true_true").await;
        assert_eq!(path, Some(PathBuf::from("./outputs/result_abc.png")));
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = ResultCache::new(DAY);
        assert!(cache.get("nonexistent_true_true").await.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_entry() {
        let cache = ResultCache::new(DAY);

        cache.put("key", "/tmp/first.png").await;
        cache.put("key", "/tmp/second.png").await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("key").await, Some(PathBuf::from("/tmp/second.png")));
    }

    #[tokio::test]
    async fn test_keys_differing_by_flags_are_distinct() {
        let cache = ResultCache::new(DAY);

        cache.put("abc_true_false", "/tmp/a.png").await;
        cache.put("abc_false_true", "/tmp/b.png").await;

        assert_eq!(cache.get("abc_true_false").await, Some(PathBuf::from("/tmp/a.png")));
        assert_eq!(cache.get("abc_false_true").await, Some(PathBuf::from("/tmp/b.png")));
        assert!(cache.get("abc_true_true").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() {
        let cache = ResultCache::new(Duration::from_millis(50));

        cache.put("key", "/tmp/result.png").await;
        assert!(cache.get("key").await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get("key").await.is_none());
        // The expired entry is dropped on lookup
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_evict_expired_removes_only_old_entries() {
        let cache = ResultCache::new(Duration::from_millis(80));

        cache.put("old", "/tmp/old.png").await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        cache.put("fresh", "/tmp/fresh.png").await;

        let removed = cache.evict_expired().await;
        assert_eq!(removed, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("fresh").await.is_some());

        let stats = cache.stats().await;
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_evict_expired_on_empty_cache() {
        let cache = ResultCache::new(DAY);
        assert_eq!(cache.evict_expired().await, 0);
    }

    #[tokio::test]
    async fn test_cache_hit_miss_counters() {
        let cache = ResultCache::new(DAY);

        cache.get("key").await;
        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);

        cache.put("key", "/tmp/result.png").await;
        cache.get("key").await;

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = ResultCache::new(DAY);
        let other = cache.clone();

        cache.put("key", "/tmp/result.png").await;
        assert!(other.get("key").await.is_some());
    }

    #[test]
    fn test_ttl_accessor() {
        let cache = ResultCache::new(DAY);
        assert_eq!(cache.ttl().num_hours(), 24);

        // Durations past chrono's range saturate instead of failing
        let forever = ResultCache::new(Duration::MAX);
        assert_eq!(forever.ttl(), TimeDelta::MAX);
    }
}
