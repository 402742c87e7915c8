//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::CREATED_AT_FIELD;
use crate::domain::types::{Collection, MonthlyStatistic};

/// A stored document: a JSON object whose `id` field mirrors its key.
pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("deadline exceeded")]
    Timeout,
    #[error("stored document could not be decoded: {message}")]
    Decode { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

/// Parameters of the monthly creation histogram shared by every collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyAggregation {
    /// Document field holding an ISO-8601 timestamp; its first seven characters are the month.
    pub time_field: &'static str,
    /// Optional secondary grouping field.
    pub secondary: Option<&'static str>,
}

impl MonthlyAggregation {
    pub fn by_creation_month() -> Self {
        Self {
            time_field: CREATED_AT_FIELD,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, field: Option<&'static str>) -> Self {
        self.secondary = field;
        self
    }
}

/// Collection-scoped document persistence.
///
/// Absence is reported as `Ok(None)` or a zero count; errors mean the backend failed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(
        &self,
        collection: Collection,
        id: Uuid,
        document: Document,
    ) -> Result<Uuid, RepoError>;

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, RepoError>;

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Option<Document>, RepoError>;

    /// Replace the named fields, leaving the rest untouched. Returns the matched count.
    async fn update_fields(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Document,
    ) -> Result<u64, RepoError>;

    /// Returns the deleted count.
    async fn delete(&self, collection: Collection, id: Uuid) -> Result<u64, RepoError>;

    /// Every document in store-native order.
    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, RepoError>;

    async fn count(&self, collection: Collection) -> Result<u64, RepoError>;

    /// Buckets sorted ascending by month, then by secondary value.
    async fn aggregate_monthly(
        &self,
        collection: Collection,
        aggregation: MonthlyAggregation,
    ) -> Result<Vec<MonthlyStatistic>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}
