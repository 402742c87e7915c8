//! Shared domain enumerations and identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;

/// Named record collections backed by the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Products,
    Orders,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Users, Collection::Products, Collection::Orders];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Products => "products",
            Collection::Orders => "orders",
        }
    }

    /// Cache key prefix for records of this collection.
    pub fn cache_prefix(self) -> &'static str {
        match self {
            Collection::Users => "user:",
            Collection::Products => "product:",
            Collection::Orders => "order:",
        }
    }

    /// Singular label used in error messages and log fields.
    pub fn entity(self) -> &'static str {
        match self {
            Collection::Users => "user",
            Collection::Products => "product",
            Collection::Orders => "order",
        }
    }
}

/// Parse a caller-supplied record identifier.
pub fn parse_record_id(raw: &str) -> Result<Uuid, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("record id must not be empty"));
    }
    Uuid::try_parse(trimmed)
        .map_err(|_| DomainError::validation(format!("`{trimmed}` is not a valid record id")))
}

/// One bucket of a monthly creation histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyStatistic {
    /// Calendar month as `YYYY-MM`.
    pub month: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}
