//! Cache key definitions.

use std::fmt;

use uuid::Uuid;

use crate::domain::types::Collection;

/// Key of a cached record: the collection prefix followed by the record id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn record(collection: Collection, id: Uuid) -> Self {
        Self(format!("{}{}", collection.cache_prefix(), id))
    }

    pub fn raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
