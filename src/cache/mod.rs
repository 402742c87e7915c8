//! Record cache.
//!
//! Read-through on misses, invalidate-on-write. Configured via the `[cache]` section:
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 10000   # 0 = unbounded
//! ttl_seconds = 0    # 0 = entries live until invalidated
//! ```

mod aside;
mod config;
mod keys;
mod lock;
mod store;

pub use aside::CacheAside;
pub use config::CacheConfig;
pub use keys::CacheKey;
pub use store::{CacheError, CacheStore, EvictionPolicy, LocalCache};

pub(crate) mod metric_names {
    pub(crate) use super::aside::{METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS};
    pub(crate) use super::store::METRIC_CACHE_EVICT;
}
