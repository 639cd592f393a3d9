//! Tiered in-memory caches.
//!
//! - [`TimedStore`]: a bounded LRU with per-entry expiry, one per domain
//! - [`CacheFabric`]: the fixed set of typed domains built from [`CacheConfig`]
//! - [`UserKeyIndex`]: user id to cache keys, for whole-user invalidation
//!
//! Domain limits are set in the `[cache]` table:
//!
//! ```toml
//! [cache]
//! index_sweep_interval_secs = 300
//!
//! [cache.user_catalogs]
//! max_entries = 500
//! ttl_secs = 300
//! ```

mod config;
mod fabric;
mod index;
pub mod keys;
mod lock;
mod metrics;
mod store;
mod sweeper;

pub use config::{CacheConfig, DomainLimits};
pub use fabric::{CacheFabric, DomainStats};
pub use index::UserKeyIndex;
pub use keys::CacheDomain;
pub use metrics::{
    CacheMetrics, CredentialKind, CredentialMetrics, DomainMetrics, METRIC_AUTH_REJECTED,
    METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_TOKEN_REFRESH,
    METRIC_TOKEN_REFRESH_MS, MetricsSnapshot,
};
pub use store::{CacheEntry, TimedStore};
pub use sweeper::{spawn_index_sweeper, sweep_once};
