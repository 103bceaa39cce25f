//! Time-bounded result cache.
//!
//! Amortizes expensive remote lookups across scrape cycles. Entries become
//! invisible to readers the moment they expire; a background sweeper task
//! reclaims their memory lazily.
//!
//! Only successful lookups are ever written: [`ResultCache::get_or_try_fetch`]
//! leaves the cache untouched when the fetch fails, so the next scrape retries
//! instead of pinning a bad value.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

/// Default expiration window for entries (6 hours).
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(6 * 60 * 60);

/// Default interval between background sweeps (10 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Longest expiry an entry can get (about ten years).
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe key/value cache with per-entry expiry.
///
/// Reads and writes are linearizable per key (single mutex around the map).
/// No ordering is guaranteed across keys.
pub struct ResultCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V> std::fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("default_ttl", &self.default_ttl)
            .field("entries", &self.lock().len())
            .finish()
    }
}

impl<V> ResultCache<V> {
    // A poisoned lock still guards a consistent map: every critical section
    // is a single map operation.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V: Clone + Send + 'static> ResultCache<V> {
    /// Create an empty cache whose [`set_default`](Self::set_default) uses `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Default time-to-live applied by [`set_default`](Self::set_default).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a live entry. Expired entries read as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Insert or replace an entry that expires after `ttl`.
    ///
    /// A `ttl` too large to represent is clamped to [`MAX_TTL`].
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(MAX_TTL))
            .unwrap_or(now);
        let entry = CacheEntry { value, expires_at };
        self.lock().insert(key.into(), entry);
    }

    /// Insert or replace an entry using the cache's default expiration window.
    pub fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Remove an entry, returning its value if it was still live.
    pub fn remove(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .remove(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value)
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result.
    ///
    /// The boolean is `true` on a cache hit. A failed fetch writes nothing.
    /// Two concurrent misses may both fetch; the later write wins.
    pub async fn get_or_try_fetch<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<(V, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok((value, true));
        }

        let value = fetch().await?;
        self.set(key, value.clone(), ttl);
        Ok((value, false))
    }

    /// Spawn a task that purges expired entries every `interval`.
    ///
    /// The task holds only a weak reference and exits once the cache is dropped.
    /// Must be called from within a Tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = cache.len(), "Cache sweep");
                }
            }
        })
    }
}

impl<V: Clone + Send + 'static> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get_hits() {
        let cache = ResultCache::new(DEFAULT_EXPIRATION);
        cache.set("rsid", 42u64, Duration::from_secs(60));
        assert_eq!(cache.get("rsid"), Some(42));
    }

    #[test]
    fn test_huge_ttl_is_clamped() {
        let cache = ResultCache::new(Duration::MAX);
        cache.set_default("rsid", 7u64);
        cache.set("other", 8u64, Duration::from_secs(3 * 10u64.pow(15) * 3600));
        assert_eq!(cache.get("rsid"), Some(7));
        assert_eq!(cache.get("other"), Some(8));
    }

    #[test]
    fn test_get_missing_key() {
        let cache: ResultCache<u64> = ResultCache::default();
        assert_eq!(cache.get("nope"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = ResultCache::new(DEFAULT_EXPIRATION);
        cache.set("rsid", 7u64, Duration::from_millis(20));
        assert_eq!(cache.get("rsid"), Some(7));

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get("rsid"), None);
        // Still stored until swept.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_set_default_uses_configured_window() {
        let cache = ResultCache::new(Duration::from_millis(20));
        cache.set_default("rsid", 1u64);
        assert_eq!(cache.get("rsid"), Some(1));

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get("rsid"), None);
    }

    #[test]
    fn test_set_overwrites_and_extends() {
        let cache = ResultCache::new(DEFAULT_EXPIRATION);
        cache.set("rsid", 1u64, Duration::from_millis(10));
        cache.set("rsid", 2u64, Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("rsid"), Some(2));
    }

    #[test]
    fn test_purge_expired() {
        let cache = ResultCache::new(DEFAULT_EXPIRATION);
        cache.set("short", 1u64, Duration::from_millis(10));
        cache.set("long", 2u64, Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn test_remove() {
        let cache = ResultCache::new(DEFAULT_EXPIRATION);
        cache.set_default("rsid", 5u64);
        assert_eq!(cache.remove("rsid"), Some(5));
        assert_eq!(cache.get("rsid"), None);
    }

    #[tokio::test]
    async fn test_fetch_populates_on_miss_then_hits() {
        let cache = ResultCache::new(DEFAULT_EXPIRATION);

        let (value, hit) = cache
            .get_or_try_fetch("rsid", Duration::from_secs(60), || async {
                Ok::<_, String>(11u64)
            })
            .await
            .unwrap();
        assert_eq!((value, hit), (11, false));

        let (value, hit) = cache
            .get_or_try_fetch("rsid", Duration::from_secs(60), || async {
                Err::<u64, _>("must not be called".to_string())
            })
            .await
            .unwrap();
        assert_eq!((value, hit), (11, true));
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_no_entry() {
        let cache: ResultCache<u64> = ResultCache::new(DEFAULT_EXPIRATION);

        let result = cache
            .get_or_try_fetch("rsid", Duration::from_secs(60), || async {
                Err::<u64, _>("cluster unreachable")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.get("rsid"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_consistent() {
        let cache = Arc::new(ResultCache::new(DEFAULT_EXPIRATION));
        let mut tasks = Vec::new();
        for i in 0..16u64 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                cache.set_default(format!("key-{}", i % 4), i);
                cache.get(&format!("key-{}", i % 4))
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }
        assert_eq!(cache.len(), 4);
    }

    #[tokio::test]
    async fn test_sweeper_purges_and_stops_when_dropped() {
        let cache = Arc::new(ResultCache::new(DEFAULT_EXPIRATION));
        cache.set("short", 1u64, Duration::from_millis(5));
        let handle = cache.spawn_sweeper(Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.is_empty());

        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should exit after cache drop")
            .unwrap();
    }
}
