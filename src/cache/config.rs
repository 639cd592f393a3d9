//! Cache configuration.
//!
//! Every domain gets its own capacity and TTL, tuned to how quickly the
//! underlying data goes stale. Configured under `[cache]` in
//! `catalog-relay.toml`:
//!
//! ```toml
//! [cache.user_catalogs]
//! max_entries = 500
//! ttl_secs = 300
//! ```

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use super::keys::CacheDomain;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

// Reference data: ids and film resolution rarely change.
const DEFAULT_FILMS: DomainLimits = DomainLimits::new(1000, HOUR);
const DEFAULT_MEMBER_IDS: DomainLimits = DomainLimits::new(2000, 6 * HOUR);
const DEFAULT_POSTERS: DomainLimits = DomainLimits::new(500, 24 * HOUR);
// Shared catalogs and list metadata.
const DEFAULT_CATALOG_PAGES: DomainLimits = DomainLimits::new(200, HOUR);
const DEFAULT_LISTS: DomainLimits = DomainLimits::new(1000, 30 * MINUTE);
// Personalized data: staleness is visible to the user.
const DEFAULT_RATINGS: DomainLimits = DomainLimits::new(5000, 5 * MINUTE);
const DEFAULT_USER_CATALOGS: DomainLimits = DomainLimits::new(500, 5 * MINUTE);
// Reuse ceiling only; token validity is checked separately.
const DEFAULT_DELEGATED_CREDENTIALS: DomainLimits = DomainLimits::new(1000, HOUR);

const DEFAULT_INDEX_SWEEP_INTERVAL_SECS: u64 = 5 * MINUTE;

/// Capacity and TTL of one cache domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DomainLimits {
    pub max_entries: usize,
    pub ttl_secs: u64,
}

impl DomainLimits {
    pub const fn new(max_entries: usize, ttl_secs: u64) -> Self {
        Self {
            max_entries,
            ttl_secs,
        }
    }

    /// Capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Cache configuration from `catalog-relay.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub films: DomainLimits,
    pub ratings: DomainLimits,
    pub member_ids: DomainLimits,
    pub lists: DomainLimits,
    pub catalog_pages: DomainLimits,
    pub posters: DomainLimits,
    pub delegated_credentials: DomainLimits,
    pub user_catalogs: DomainLimits,
    /// Interval of the invalidation-index sweep, in seconds.
    pub index_sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            films: DEFAULT_FILMS,
            ratings: DEFAULT_RATINGS,
            member_ids: DEFAULT_MEMBER_IDS,
            lists: DEFAULT_LISTS,
            catalog_pages: DEFAULT_CATALOG_PAGES,
            posters: DEFAULT_POSTERS,
            delegated_credentials: DEFAULT_DELEGATED_CREDENTIALS,
            user_catalogs: DEFAULT_USER_CATALOGS,
            index_sweep_interval_secs: DEFAULT_INDEX_SWEEP_INTERVAL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn limits(&self, domain: CacheDomain) -> DomainLimits {
        match domain {
            CacheDomain::Films => self.films,
            CacheDomain::Ratings => self.ratings,
            CacheDomain::MemberIds => self.member_ids,
            CacheDomain::Lists => self.lists,
            CacheDomain::CatalogPages => self.catalog_pages,
            CacheDomain::Posters => self.posters,
            CacheDomain::DelegatedCredentials => self.delegated_credentials,
            CacheDomain::UserCatalogs => self.user_catalogs,
        }
    }

    pub fn index_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.index_sweep_interval_secs.max(1))
    }
}
