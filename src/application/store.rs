//! Typed, deadline-bounded access to one collection of the document store.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{Document, DocumentStore, MonthlyAggregation, RepoError};
use crate::domain::entities::Record;
use crate::domain::types::MonthlyStatistic;

/// Default bound on a single store operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

pub fn encode_document<T: Serialize>(value: &T) -> Result<Document, RepoError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RepoError::InvalidInput {
            message: format!("expected a JSON object, got `{other}`"),
        }),
        Err(err) => Err(RepoError::InvalidInput {
            message: err.to_string(),
        }),
    }
}

pub fn decode_document<T: DeserializeOwned>(document: Document) -> Result<T, RepoError> {
    serde_json::from_value(Value::Object(document)).map_err(RepoError::decode)
}

pub struct RecordStore<E> {
    inner: Arc<dyn DocumentStore>,
    timeout: Duration,
    _record: PhantomData<fn() -> E>,
}

impl<E> Clone for RecordStore<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            timeout: self.timeout,
            _record: PhantomData,
        }
    }
}

impl<E: Record> RecordStore<E> {
    pub fn new(inner: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            _record: PhantomData,
        }
    }

    pub async fn insert(&self, record: &E) -> Result<Uuid, RepoError> {
        let document = encode_document(record)?;
        self.bounded(
            "insert",
            self.inner.insert(E::COLLECTION, record.id(), document),
        )
        .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<E>, RepoError> {
        self.bounded("find_by_id", self.inner.find_by_id(E::COLLECTION, id))
            .await?
            .map(decode_document)
            .transpose()
    }

    pub async fn find_by_field(&self, field: &str, value: &Value) -> Result<Option<E>, RepoError> {
        self.bounded(
            "find_by_field",
            self.inner.find_by_field(E::COLLECTION, field, value),
        )
        .await?
        .map(decode_document)
        .transpose()
    }

    pub async fn update_fields(&self, id: Uuid, fields: Document) -> Result<u64, RepoError> {
        self.bounded(
            "update_fields",
            self.inner.update_fields(E::COLLECTION, id, fields),
        )
        .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<u64, RepoError> {
        self.bounded("delete", self.inner.delete(E::COLLECTION, id))
            .await
    }

    pub async fn list_all(&self) -> Result<Vec<E>, RepoError> {
        self.bounded("list_all", self.inner.list_all(E::COLLECTION))
            .await?
            .into_iter()
            .map(decode_document)
            .collect()
    }

    pub async fn count(&self) -> Result<u64, RepoError> {
        self.bounded("count", self.inner.count(E::COLLECTION)).await
    }

    pub async fn aggregate_monthly(&self) -> Result<Vec<MonthlyStatistic>, RepoError> {
        let aggregation =
            MonthlyAggregation::by_creation_month().with_secondary(E::STATISTICS_GROUP);
        self.bounded(
            "aggregate_monthly",
            self.inner.aggregate_monthly(E::COLLECTION, aggregation),
        )
        .await
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, RepoError>
    where
        F: Future<Output = Result<T, RepoError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    target = "shopkeep::store",
                    collection = E::COLLECTION.as_str(),
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "store operation exceeded its deadline"
                );
                Err(RepoError::Timeout)
            }
        }
    }
}
