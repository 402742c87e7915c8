//! Cache configuration.
//!
//! Controls the record cache via the `[cache]` section of `shopkeep.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use super::store::EvictionPolicy;

const DEFAULT_CAPACITY: usize = 10_000;
const DEFAULT_TTL_SECONDS: u64 = 0;

/// Record cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the record cache. When off, every read goes to the store.
    pub enabled: bool,
    /// Maximum cached records across all collections; zero means unbounded.
    pub capacity: usize,
    /// Lifetime of a cached record in seconds; zero means entries live until invalidated.
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity,
            ttl_seconds: settings.ttl_seconds,
        }
    }
}

impl CacheConfig {
    pub fn capacity_non_zero(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.capacity)
    }

    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_seconds > 0).then(|| Duration::from_secs(self.ttl_seconds))
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            capacity: self.capacity_non_zero(),
            default_ttl: self.ttl(),
        }
    }
}
