//! The fixed roster of typed cache domains.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::clock::SharedClock;
use crate::domain::catalog::CatalogResult;
use crate::domain::credentials::DelegatedCredential;
use crate::domain::films::{FilmRating, ListSummary, ResolvedFilm};

use super::config::CacheConfig;
use super::keys::CacheDomain;
use super::metrics::CacheMetrics;
use super::store::TimedStore;

/// Size and limits of one domain, for operational visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DomainStats {
    pub size: usize,
    pub max: usize,
    pub ttl_secs: u64,
}

/// Owns one independently typed [`TimedStore`] per cache domain.
///
/// Domains are created once from [`CacheConfig`] and never added at runtime.
pub struct CacheFabric {
    films: TimedStore<ResolvedFilm>,
    ratings: TimedStore<FilmRating>,
    member_ids: TimedStore<String>,
    lists: TimedStore<ListSummary>,
    catalog_pages: TimedStore<Arc<CatalogResult>>,
    posters: TimedStore<Bytes>,
    delegated_credentials: TimedStore<DelegatedCredential>,
    user_catalogs: TimedStore<Arc<CatalogResult>>,
}

impl CacheFabric {
    pub fn new(config: &CacheConfig, clock: SharedClock, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            films: store(config, &clock, &metrics, CacheDomain::Films),
            ratings: store(config, &clock, &metrics, CacheDomain::Ratings),
            member_ids: store(config, &clock, &metrics, CacheDomain::MemberIds),
            lists: store(config, &clock, &metrics, CacheDomain::Lists),
            catalog_pages: store(config, &clock, &metrics, CacheDomain::CatalogPages),
            posters: store(config, &clock, &metrics, CacheDomain::Posters),
            delegated_credentials: store(
                config,
                &clock,
                &metrics,
                CacheDomain::DelegatedCredentials,
            ),
            user_catalogs: store(config, &clock, &metrics, CacheDomain::UserCatalogs),
        }
    }

    pub fn films(&self) -> &TimedStore<ResolvedFilm> {
        &self.films
    }

    pub fn ratings(&self) -> &TimedStore<FilmRating> {
        &self.ratings
    }

    pub fn member_ids(&self) -> &TimedStore<String> {
        &self.member_ids
    }

    pub fn lists(&self) -> &TimedStore<ListSummary> {
        &self.lists
    }

    pub fn catalog_pages(&self) -> &TimedStore<Arc<CatalogResult>> {
        &self.catalog_pages
    }

    pub fn posters(&self) -> &TimedStore<Bytes> {
        &self.posters
    }

    pub fn delegated_credentials(&self) -> &TimedStore<DelegatedCredential> {
        &self.delegated_credentials
    }

    pub fn user_catalogs(&self) -> &TimedStore<Arc<CatalogResult>> {
        &self.user_catalogs
    }

    /// `{domain: {size, max, ttl}}` for every domain.
    pub fn stats(&self) -> BTreeMap<&'static str, DomainStats> {
        let mut stats = BTreeMap::new();
        for domain in CacheDomain::ALL {
            let (size, max, ttl) = match domain {
                CacheDomain::Films => dims(&self.films),
                CacheDomain::Ratings => dims(&self.ratings),
                CacheDomain::MemberIds => dims(&self.member_ids),
                CacheDomain::Lists => dims(&self.lists),
                CacheDomain::CatalogPages => dims(&self.catalog_pages),
                CacheDomain::Posters => dims(&self.posters),
                CacheDomain::DelegatedCredentials => dims(&self.delegated_credentials),
                CacheDomain::UserCatalogs => dims(&self.user_catalogs),
            };
            stats.insert(
                domain.as_str(),
                DomainStats {
                    size,
                    max,
                    ttl_secs: ttl,
                },
            );
        }
        stats
    }

    /// Drop expired entries from every domain.
    pub fn purge_expired(&self) -> usize {
        self.films.purge_expired()
            + self.ratings.purge_expired()
            + self.member_ids.purge_expired()
            + self.lists.purge_expired()
            + self.catalog_pages.purge_expired()
            + self.posters.purge_expired()
            + self.delegated_credentials.purge_expired()
            + self.user_catalogs.purge_expired()
    }

    /// Clear all cached data.
    pub fn clear(&self) {
        self.films.clear();
        self.ratings.clear();
        self.member_ids.clear();
        self.lists.clear();
        self.catalog_pages.clear();
        self.posters.clear();
        self.delegated_credentials.clear();
        self.user_catalogs.clear();
    }
}

fn store<V: Clone>(
    config: &CacheConfig,
    clock: &SharedClock,
    metrics: &Arc<CacheMetrics>,
    domain: CacheDomain,
) -> TimedStore<V> {
    let limits = config.limits(domain);
    TimedStore::new(
        domain,
        limits.max_entries_non_zero(),
        limits.ttl(),
        Arc::clone(clock),
        Arc::clone(metrics),
    )
}

fn dims<V: Clone>(store: &TimedStore<V>) -> (usize, usize, u64) {
    (store.len(), store.max(), store.ttl().as_secs())
}
