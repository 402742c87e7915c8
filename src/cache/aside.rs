//! Cache-aside access for records.
//!
//! Every cache failure degrades to a miss: the document store stays authoritative, so a
//! broken cache only costs latency.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::entities::Record;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::store::{CacheStore, LocalCache};

pub(crate) const METRIC_CACHE_HIT: &str = "shopkeep_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "shopkeep_cache_miss_total";
pub(crate) const METRIC_CACHE_ERROR: &str = "shopkeep_cache_error_total";

const TARGET: &str = "shopkeep::cache";

#[derive(Clone, Default)]
pub struct CacheAside {
    store: Option<Arc<dyn CacheStore>>,
    ttl: Option<Duration>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Option<Duration>) -> Self {
        Self {
            store: Some(store),
            ttl,
        }
    }

    /// Store-only mode: lookups always miss and writes are no-ops.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build the record cache described by `config`.
    pub fn from_config(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        let local = LocalCache::new(config.eviction_policy());
        Self::new(Arc::new(local), None)
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn lookup<E: Record>(&self, id: Uuid) -> Option<E> {
        let store = self.store.as_ref()?;
        let key = CacheKey::record(E::COLLECTION, id);

        let bytes = match store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                counter!(METRIC_CACHE_MISS, "collection" => E::COLLECTION.as_str()).increment(1);
                return None;
            }
            Err(err) => {
                record_failure(E::COLLECTION.as_str(), "get", &key, &err);
                counter!(METRIC_CACHE_MISS, "collection" => E::COLLECTION.as_str()).increment(1);
                return None;
            }
        };

        match serde_json::from_slice::<E>(&bytes) {
            Ok(record) => {
                counter!(METRIC_CACHE_HIT, "collection" => E::COLLECTION.as_str()).increment(1);
                debug!(target: TARGET, key = %key, "cache hit");
                Some(record)
            }
            Err(err) => {
                record_failure(E::COLLECTION.as_str(), "decode", &key, &err);
                counter!(METRIC_CACHE_MISS, "collection" => E::COLLECTION.as_str()).increment(1);
                if let Err(err) = store.delete(&key).await {
                    record_failure(E::COLLECTION.as_str(), "delete", &key, &err);
                }
                None
            }
        }
    }

    pub async fn populate<E: Record>(&self, record: &E) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let key = CacheKey::record(E::COLLECTION, record.id());

        let bytes = match serde_json::to_vec(record) {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                record_failure(E::COLLECTION.as_str(), "encode", &key, &err);
                return;
            }
        };

        if let Err(err) = store.set(key.clone(), bytes, self.ttl).await {
            record_failure(E::COLLECTION.as_str(), "set", &key, &err);
        }
    }

    pub async fn invalidate<E: Record>(&self, id: Uuid) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let key = CacheKey::record(E::COLLECTION, id);
        if let Err(err) = store.delete(&key).await {
            record_failure(E::COLLECTION.as_str(), "delete", &key, &err);
        }
    }
}

fn record_failure(
    collection: &'static str,
    op: &'static str,
    key: &CacheKey,
    err: &dyn std::fmt::Display,
) {
    counter!(METRIC_CACHE_ERROR, "collection" => collection, "op" => op).increment(1);
    warn!(
        target: TARGET,
        collection,
        op,
        key = %key,
        error = %err,
        "cache operation failed; falling back to the store"
    );
}
