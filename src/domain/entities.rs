//! Record types stored as documents, with their create drafts and partial patches.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use super::error::DomainError;
use super::types::Collection;

/// Document field holding the creation timestamp used for monthly bucketing.
pub const CREATED_AT_FIELD: &str = "created_at";

/// A field whose value must be unique across a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueKey {
    pub field: &'static str,
    pub value: Value,
}

impl UniqueKey {
    pub fn text(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: Value::String(value.to_string()),
        }
    }
}

/// A record type persisted in one collection of the document store.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Create input accepted from callers.
    type Draft: DeserializeOwned + Send + 'static;
    /// Typed partial update.
    type Patch: RecordPatch;

    const COLLECTION: Collection;

    /// Secondary grouping key for monthly statistics, if any.
    const STATISTICS_GROUP: Option<&'static str> = None;

    /// Validate a draft and materialise the record under a freshly assigned id.
    fn from_draft(id: Uuid, draft: Self::Draft, now: OffsetDateTime) -> Result<Self, DomainError>;

    fn id(&self) -> Uuid;

    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }
}

/// Partial field set applied with replacement semantics.
pub trait RecordPatch: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Validate and canonicalise the supplied fields.
    fn normalize(self) -> Result<Self, DomainError>;

    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }
}

fn required_text(value: &str, field: &'static str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn positive_price(price: f64) -> Result<f64, DomainError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(DomainError::validation("price must be greater than zero"));
    }
    Ok(price)
}

/// Month bucketing reads the first seven characters, so timestamps are kept in UTC and
/// within the four-digit years RFC 3339 can represent.
fn creation_time(
    supplied: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> Result<OffsetDateTime, DomainError> {
    supplied
        .unwrap_or(now)
        .checked_to_offset(UtcOffset::UTC)
        .filter(|created_at| (0..=9999).contains(&created_at.year()))
        .ok_or_else(|| {
            DomainError::validation("created_at must fall between years 0000 and 9999 in UTC")
        })
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Record for UserRecord {
    type Draft = NewUser;
    type Patch = UserPatch;

    const COLLECTION: Collection = Collection::Users;

    fn from_draft(id: Uuid, draft: NewUser, now: OffsetDateTime) -> Result<Self, DomainError> {
        Ok(Self {
            id,
            name: required_text(&draft.name, "name")?,
            email: required_text(&draft.email, "email")?,
            created_at: creation_time(draft.created_at, now)?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::text("email", &self.email)]
    }
}

impl RecordPatch for UserPatch {
    fn normalize(self) -> Result<Self, DomainError> {
        Ok(Self {
            name: self
                .name
                .map(|name| required_text(&name, "name"))
                .transpose()?,
            email: self
                .email
                .map(|email| required_text(&email, "email"))
                .transpose()?,
        })
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        self.email
            .as_deref()
            .map(|email| UniqueKey::text("email", email))
            .into_iter()
            .collect()
    }
}

// ============================================================================
// Products
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl Record for ProductRecord {
    type Draft = NewProduct;
    type Patch = ProductPatch;

    const COLLECTION: Collection = Collection::Products;

    fn from_draft(id: Uuid, draft: NewProduct, now: OffsetDateTime) -> Result<Self, DomainError> {
        Ok(Self {
            id,
            name: required_text(&draft.name, "name")?,
            price: positive_price(draft.price)?,
            created_at: creation_time(draft.created_at, now)?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }
}

impl RecordPatch for ProductPatch {
    fn normalize(self) -> Result<Self, DomainError> {
        Ok(Self {
            name: self
                .name
                .map(|name| required_text(&name, "name"))
                .transpose()?,
            price: self.price.map(positive_price).transpose()?,
        })
    }
}

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub status: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Record for OrderRecord {
    type Draft = NewOrder;
    type Patch = OrderPatch;

    const COLLECTION: Collection = Collection::Orders;
    const STATISTICS_GROUP: Option<&'static str> = Some("status");

    fn from_draft(id: Uuid, draft: NewOrder, now: OffsetDateTime) -> Result<Self, DomainError> {
        Ok(Self {
            id,
            user_id: draft.user_id,
            product_id: draft.product_id,
            quantity: draft.quantity,
            status: draft.status,
            created_at: creation_time(draft.created_at, now)?,
        })
    }

    fn id(&self) -> Uuid {
        self.id
    }
}

impl RecordPatch for OrderPatch {
    fn normalize(self) -> Result<Self, DomainError> {
        Ok(self)
    }
}
