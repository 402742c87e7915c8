//! Cache-aside record service shared by every collection.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::application::notify::NotificationDispatcher;
use crate::application::repos::{Document, DocumentStore, RepoError};
use crate::application::store::{RecordStore, encode_document};
use crate::cache::CacheAside;
use crate::domain::entities::{Record, RecordPatch, UniqueKey};
use crate::domain::error::DomainError;
use crate::domain::types::{MonthlyStatistic, parse_record_id};

const TARGET: &str = "shopkeep::records";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("validation failed: {message}")]
    Validation { message: String },
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("serialization failed: {message}")]
    Serialization { message: String },
    #[error(transparent)]
    Backend(RepoError),
}

impl RecordError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Backend(RepoError::Timeout))
    }
}

impl From<DomainError> for RecordError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::NotFound { entity } => Self::NotFound { entity },
            DomainError::Validation { message } => Self::Validation { message },
        }
    }
}

impl From<RepoError> for RecordError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::Decode { message } | RepoError::InvalidInput { message } => {
                Self::Serialization { message }
            }
            RepoError::Duplicate { constraint } => Self::Validation {
                message: format!("record already exists ({constraint})"),
            },
            other => Self::Backend(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub id: Uuid,
    pub matched: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: Uuid,
    pub deleted: u64,
}

pub struct RecordService<E: Record> {
    store: RecordStore<E>,
    cache: CacheAside,
    notifier: Option<NotificationDispatcher>,
}

impl<E: Record> Clone for RecordService<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<E: Record> RecordService<E> {
    pub fn new(store: Arc<dyn DocumentStore>, cache: CacheAside, timeout: Duration) -> Self {
        Self {
            store: RecordStore::new(store, timeout),
            cache,
            notifier: None,
        }
    }

    /// Emit a creation notification for every record this service creates.
    pub fn with_notifier(mut self, notifier: NotificationDispatcher) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_notifier_opt(self, notifier: Option<NotificationDispatcher>) -> Self {
        match notifier {
            Some(notifier) => self.with_notifier(notifier),
            None => self,
        }
    }

    #[instrument(skip_all, fields(collection = E::COLLECTION.as_str()))]
    pub async fn create(&self, draft: E::Draft) -> Result<E, RecordError> {
        let record = E::from_draft(Uuid::new_v4(), draft, OffsetDateTime::now_utc())?;
        self.ensure_unique(&record.unique_keys(), None).await?;

        let id = self.store.insert(&record).await?;
        self.cache.populate(&record).await;

        if let Some(notifier) = &self.notifier {
            notifier.notify_created(&record);
        }

        info!(target: TARGET, collection = E::COLLECTION.as_str(), id = %id, "record created");
        Ok(record)
    }

    /// Cache first, then the store; a store hit repopulates the cache.
    ///
    /// Not linearizable against concurrent writes: if an update or delete of the same id
    /// lands between this read's store fetch and its cache populate, the pre-write record
    /// is cached and served until the next write of that id invalidates it (or the entry
    /// expires under a TTL policy).
    #[instrument(skip_all, fields(collection = E::COLLECTION.as_str()))]
    pub async fn read(&self, raw_id: &str) -> Result<E, RecordError> {
        let id = parse_record_id(raw_id)?;

        if let Some(record) = self.cache.lookup::<E>(id).await {
            return Ok(record);
        }

        let record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(not_found::<E>)?;
        self.cache.populate(&record).await;

        debug!(target: TARGET, collection = E::COLLECTION.as_str(), id = %id, "record loaded from store");
        Ok(record)
    }

    /// Replace the supplied fields of a record. `fields` is the caller's raw JSON object.
    ///
    /// The store write and the cache invalidation are two independent steps. If the process
    /// dies between them, a shared cache backend keeps serving the old record until the next
    /// write of that id or the entry's TTL; [`LocalCache`](crate::cache::LocalCache) entries
    /// die with the process.
    #[instrument(skip_all, fields(collection = E::COLLECTION.as_str()))]
    pub async fn update(&self, raw_id: &str, fields: Document) -> Result<UpdateOutcome, RecordError> {
        let id = parse_record_id(raw_id)?;
        if fields.is_empty() {
            return Err(RecordError::validation("update must name at least one field"));
        }

        let patch: E::Patch = serde_json::from_value(Value::Object(fields))
            .map_err(|err| RecordError::validation(err.to_string()))?;
        let patch = patch.normalize()?;
        let changes = encode_document(&patch)?;
        if changes.is_empty() {
            return Err(RecordError::validation("update must name at least one field"));
        }

        self.ensure_unique(&patch.unique_keys(), Some(id)).await?;

        let result = self.store.update_fields(id, changes).await;
        self.cache.invalidate::<E>(id).await;

        let matched = result?;
        if matched == 0 {
            return Err(not_found::<E>());
        }

        info!(target: TARGET, collection = E::COLLECTION.as_str(), id = %id, matched, "record updated");
        Ok(UpdateOutcome { id, matched })
    }

    /// Store delete followed by cache invalidation, with the same two-step staleness window
    /// as [`RecordService::update`].
    #[instrument(skip_all, fields(collection = E::COLLECTION.as_str()))]
    pub async fn delete(&self, raw_id: &str) -> Result<DeleteOutcome, RecordError> {
        let id = parse_record_id(raw_id)?;

        let result = self.store.delete(id).await;
        self.cache.invalidate::<E>(id).await;

        let deleted = result?;
        if deleted == 0 {
            return Err(not_found::<E>());
        }

        info!(target: TARGET, collection = E::COLLECTION.as_str(), id = %id, "record deleted");
        Ok(DeleteOutcome { id, deleted })
    }

    pub async fn list(&self) -> Result<Vec<E>, RecordError> {
        Ok(self.store.list_all().await?)
    }

    pub async fn count(&self) -> Result<u64, RecordError> {
        Ok(self.store.count().await?)
    }

    pub async fn monthly_statistics(&self) -> Result<Vec<MonthlyStatistic>, RecordError> {
        Ok(self.store.aggregate_monthly().await?)
    }

    async fn ensure_unique(&self, keys: &[UniqueKey], owner: Option<Uuid>) -> Result<(), RecordError> {
        for key in keys {
            let existing = self.store.find_by_field(key.field, &key.value).await?;
            if let Some(existing) = existing
                && Some(existing.id()) != owner
            {
                return Err(RecordError::validation(format!(
                    "{} `{}` is already in use",
                    key.field,
                    display_value(&key.value)
                )));
            }
        }
        Ok(())
    }
}

fn not_found<E: Record>() -> RecordError {
    RecordError::NotFound {
        entity: E::COLLECTION.entity(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
