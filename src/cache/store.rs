//! Cache storage implementations.
//!
//! `CacheStore` is the seam for any key-value backend; `LocalCache` is the
//! in-process implementation with an explicit eviction policy.

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;

use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_EVICT: &str = "shopkeep_cache_evict_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out")]
    Timeout,
}

/// Opaque byte-string key-value store.
///
/// A `ttl` of `Some(Duration::ZERO)` stores without expiry; `None` defers to the backend's default.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError>;

    async fn set(&self, key: CacheKey, value: Bytes, ttl: Option<Duration>)
    -> Result<(), CacheError>;

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError>;
}

/// How the local cache bounds its memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Least-recently-used entries are evicted beyond this many keys. `None` is unbounded.
    pub capacity: Option<NonZeroUsize>,
    /// Lifetime applied when a write does not name one. `None` keeps entries until deleted.
    pub default_ttl: Option<Duration>,
}

impl EvictionPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn lru(capacity: NonZeroUsize) -> Self {
        Self {
            capacity: Some(capacity),
            default_ttl: None,
        }
    }

    fn expiry_for(&self, ttl: Option<Duration>) -> Option<Instant> {
        let ttl = match ttl {
            Some(ttl) if ttl.is_zero() => return None,
            Some(ttl) => ttl,
            None => self.default_ttl?,
        };
        Some(Instant::now() + ttl)
    }
}

#[derive(Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-process record cache.
pub struct LocalCache {
    policy: EvictionPolicy,
    entries: RwLock<LruCache<CacheKey, Entry>>,
}

impl LocalCache {
    pub fn new(policy: EvictionPolicy) -> Self {
        let entries = match policy.capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            policy,
            entries: RwLock::new(entries),
        }
    }

    /// Get the number of cached entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_local(&self, key: &CacheKey) -> Option<Bytes> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let entry = entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            entries.pop(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn set_local(&self, key: CacheKey, value: Bytes, ttl: Option<Duration>) {
        let entry = Entry {
            value,
            expires_at: self.policy.expiry_for(ttl),
        };
        let displaced = rw_write(&self.entries, SOURCE, "set").push(key.clone(), entry);
        if let Some((displaced_key, _)) = displaced
            && displaced_key != key
        {
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
    }

    fn delete_local(&self, key: &CacheKey) {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
    }
}

#[async_trait]
impl CacheStore for LocalCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        Ok(self.get_local(key))
    }

    async fn set(
        &self,
        key: CacheKey,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.set_local(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.delete_local(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn key(name: &str) -> CacheKey {
        CacheKey::raw(name)
    }

    #[tokio::test]
    async fn roundtrip_and_delete() {
        let cache = LocalCache::new(EvictionPolicy::unbounded());

        assert!(cache.get(&key("user:1")).await.unwrap().is_none());
        cache
            .set(key("user:1"), Bytes::from_static(b"{}"), None)
            .await
            .unwrap();
        assert_eq!(
            cache.get(&key("user:1")).await.unwrap(),
            Some(Bytes::from_static(b"{}"))
        );

        cache.delete(&key("user:1")).await.unwrap();
        assert!(cache.get(&key("user:1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_missing_key_is_not_an_error() {
        let cache = LocalCache::new(EvictionPolicy::unbounded());
        cache.delete(&key("order:absent")).await.unwrap();
    }

    #[tokio::test]
    async fn lru_eviction() {
        let cache = LocalCache::new(EvictionPolicy::lru(NonZeroUsize::new(2).unwrap()));

        cache.set(key("a"), Bytes::from("1"), None).await.unwrap();
        cache.set(key("b"), Bytes::from("2"), None).await.unwrap();

        // Touch `a` so `b` becomes least recently used.
        assert!(cache.get(&key("a")).await.unwrap().is_some());
        cache.set(key("c"), Bytes::from("3"), None).await.unwrap();

        assert!(cache.get(&key("a")).await.unwrap().is_some());
        assert!(cache.get(&key("b")).await.unwrap().is_none()); // Evicted
        assert!(cache.get(&key("c")).await.unwrap().is_some());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn unbounded_policy_keeps_everything() {
        let cache = LocalCache::new(EvictionPolicy::unbounded());
        for i in 0..500 {
            cache
                .set(key(&format!("product:{i}")), Bytes::from("x"), None)
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn default_ttl_expires_entries() {
        let cache = LocalCache::new(EvictionPolicy {
            capacity: None,
            default_ttl: Some(Duration::from_secs(5)),
        });
        cache.set(key("a"), Bytes::from("1"), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get(&key("a")).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(&key("a")).await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_overrides_default_expiry() {
        let cache = LocalCache::new(EvictionPolicy {
            capacity: None,
            default_ttl: Some(Duration::from_secs(1)),
        });
        cache
            .set(key("a"), Bytes::from("1"), Some(Duration::ZERO))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get(&key("a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn recovers_from_poisoned_lock() {
        let cache = LocalCache::new(EvictionPolicy::unbounded());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        cache.set(key("a"), Bytes::from("1"), None).await.unwrap();
        assert!(cache.get(&key("a")).await.unwrap().is_some());
    }
}
