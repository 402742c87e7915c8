#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use shopkeep::application::notify::{Notification, NotificationPublisher, NotifyError};
use shopkeep::application::repos::{Document, DocumentStore, MonthlyAggregation, RepoError};
use shopkeep::cache::{CacheError, CacheKey, CacheStore, EvictionPolicy, LocalCache};
use shopkeep::domain::types::{Collection, MonthlyStatistic};

/// In-memory document store that counts calls and can be told to fail or stall.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Vec<(Uuid, Document)>>>,
    calls: AtomicUsize,
    failing: AtomicBool,
    stalled: AtomicBool,
    read_gate: std::sync::Mutex<Option<ReadGate>>,
}

/// Pauses the next `find_by_id` after it has fetched its document.
#[derive(Clone, Default)]
pub struct ReadGate {
    pub fetched: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Remove a document behind the service's back, leaving any cache entry stale.
    pub async fn remove_directly(&self, collection: Collection, id: Uuid) {
        if let Some(documents) = self.collections.lock().await.get_mut(&collection) {
            documents.retain(|(existing, _)| *existing != id);
        }
    }

    /// Hold the next `find_by_id` between reading the document and returning it.
    pub fn gate_next_read(&self) -> ReadGate {
        let gate = ReadGate::default();
        *self.read_gate.lock().expect("read gate lock") = Some(gate.clone());
        gate
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .lock()
            .await
            .get(&collection)
            .map_or(0, Vec::len)
    }

    async fn enter(&self) -> Result<(), RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(
        &self,
        collection: Collection,
        id: Uuid,
        document: Document,
    ) -> Result<Uuid, RepoError> {
        self.enter().await?;
        let mut collections = self.collections.lock().await;
        let documents = collections.entry(collection).or_default();
        if documents.iter().any(|(existing, _)| *existing == id) {
            return Err(RepoError::Duplicate {
                constraint: "documents_pkey".into(),
            });
        }
        documents.push((id, document));
        Ok(id)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepoError> {
        self.enter().await?;
        let document = {
            let collections = self.collections.lock().await;
            collections.get(&collection).and_then(|documents| {
                documents
                    .iter()
                    .find(|(existing, _)| *existing == id)
                    .map(|(_, document)| document.clone())
            })
        };

        let gate = self.read_gate.lock().expect("read gate lock").take();
        if let Some(gate) = gate {
            gate.fetched.notify_one();
            gate.release.notified().await;
        }
        Ok(document)
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Option<Document>, RepoError> {
        self.enter().await?;
        let collections = self.collections.lock().await;
        Ok(collections.get(&collection).and_then(|documents| {
            documents
                .iter()
                .find(|(_, document)| document.get(field) == Some(value))
                .map(|(_, document)| document.clone())
        }))
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Document,
    ) -> Result<u64, RepoError> {
        self.enter().await?;
        let mut collections = self.collections.lock().await;
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        match documents.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, document)) => {
                for (key, value) in fields {
                    document.insert(key, value);
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<u64, RepoError> {
        self.enter().await?;
        let mut collections = self.collections.lock().await;
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|(existing, _)| *existing != id);
        Ok((before - documents.len()) as u64)
    }

    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, RepoError> {
        self.enter().await?;
        let collections = self.collections.lock().await;
        Ok(collections
            .get(&collection)
            .map(|documents| documents.iter().map(|(_, document)| document.clone()).collect())
            .unwrap_or_default())
    }

    async fn count(&self, collection: Collection) -> Result<u64, RepoError> {
        self.enter().await?;
        let collections = self.collections.lock().await;
        Ok(collections.get(&collection).map_or(0, Vec::len) as u64)
    }

    async fn aggregate_monthly(
        &self,
        collection: Collection,
        aggregation: MonthlyAggregation,
    ) -> Result<Vec<MonthlyStatistic>, RepoError> {
        self.enter().await?;
        let collections = self.collections.lock().await;
        let mut buckets: BTreeMap<(String, Option<String>), u64> = BTreeMap::new();
        for (_, document) in collections.get(&collection).into_iter().flatten() {
            let Some(timestamp) = document.get(aggregation.time_field).and_then(Value::as_str)
            else {
                continue;
            };
            let month: String = timestamp.chars().take(7).collect();
            let secondary = aggregation.secondary.and_then(|field| {
                document
                    .get(field)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
            *buckets.entry((month, secondary)).or_default() += 1;
        }
        Ok(buckets
            .into_iter()
            .map(|((month, status), count)| MonthlyStatistic {
                month,
                count,
                status,
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.enter().await
    }
}

/// Local cache wrapper counting every backend call.
pub struct CountingCache {
    inner: LocalCache,
    calls: AtomicUsize,
}

impl CountingCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalCache::new(EvictionPolicy::unbounded()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl CacheStore for CountingCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: CacheKey,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }
}

/// Cache backend that is never reachable.
pub struct UnreachableCache;

#[async_trait]
impl CacheStore for UnreachableCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(
        &self,
        _key: CacheKey,
        _value: Bytes,
        _ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &CacheKey) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub seen: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.seen.lock().await.push(notification.clone());
        Ok(())
    }
}

pub struct FailingPublisher;

#[async_trait]
impl NotificationPublisher for FailingPublisher {
    async fn publish(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport {
            message: "broker down".into(),
        })
    }
}
