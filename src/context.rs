//! The process-wide relay context.
//!
//! Owns every cache, the invalidation index, the credential manager and the
//! services built on them. Constructed once at start-up and shared by `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::catalog::CatalogService;
use crate::application::credentials::CredentialStore;
use crate::application::films::FilmService;
use crate::application::upstream::CatalogUpstream;
use crate::auth::{AuthSettings, AuthenticatedClient, CredentialManager, Principal};
use crate::cache::{
    self, CacheConfig, CacheFabric, CacheMetrics, DomainStats, MetricsSnapshot, UserKeyIndex,
};
use crate::clock::SharedClock;

/// Cache occupancy for operational visibility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub domains: BTreeMap<&'static str, DomainStats>,
    pub index: IndexStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub users: usize,
    pub keys: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub entries: usize,
    pub index_keys: usize,
}

pub struct RelayContext {
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
    fabric: Arc<CacheFabric>,
    index: Arc<UserKeyIndex>,
    credentials: Arc<CredentialManager>,
    films: FilmService,
    catalogs: CatalogService,
}

impl RelayContext {
    pub fn new(
        config: CacheConfig,
        auth: AuthSettings,
        upstream: Arc<dyn CatalogUpstream>,
        store: Arc<dyn CredentialStore>,
        clock: SharedClock,
    ) -> Self {
        let metrics = Arc::new(CacheMetrics::new());
        let fabric = Arc::new(CacheFabric::new(&config, clock.clone(), metrics.clone()));
        let index = Arc::new(UserKeyIndex::new());
        let credentials = Arc::new(CredentialManager::new(
            upstream.clone(),
            store,
            fabric.clone(),
            metrics.clone(),
            clock,
            auth,
        ));

        Self {
            films: FilmService::new(upstream, fabric.clone()),
            catalogs: CatalogService::new(fabric.clone(), index.clone()),
            config,
            metrics,
            fabric,
            index,
            credentials,
        }
    }

    /// Client acting on behalf of `user_id`.
    pub fn client_for_user(&self, user_id: &str) -> AuthenticatedClient {
        AuthenticatedClient::new(
            self.credentials.clone(),
            Principal::User(user_id.to_string()),
        )
    }

    /// Client acting as the relay itself.
    pub fn app_client(&self) -> AuthenticatedClient {
        AuthenticatedClient::new(self.credentials.clone(), Principal::App)
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn films(&self) -> &FilmService {
        &self.films
    }

    pub fn catalogs(&self) -> &CatalogService {
        &self.catalogs
    }

    pub fn fabric(&self) -> &CacheFabric {
        &self.fabric
    }

    pub fn index(&self) -> &UserKeyIndex {
        &self.index
    }

    /// Must be called by every path that changes a user's catalog
    /// preferences, before it reports success.
    pub fn preferences_changed(&self, user_id: &str) -> usize {
        self.catalogs.invalidate_user_catalogs(user_id)
    }

    /// Drop everything cached for a user, credentials included.
    pub fn forget_user(&self, user_id: &str) {
        self.credentials.invalidate_user(user_id);
        let catalogs = self.catalogs.invalidate_user_catalogs(user_id);
        info!(
            target = "catalog_relay::context",
            user_id, catalogs, "forgot cached user state"
        );
    }

    /// Drop expired entries from every domain and prune the index.
    pub fn purge_expired(&self) -> PurgeReport {
        let entries = self.fabric.purge_expired();
        let index_keys = cache::sweep_once(&self.index, &self.fabric);
        PurgeReport {
            entries,
            index_keys,
        }
    }

    /// Empty every domain and the invalidation index.
    pub fn clear_caches(&self) {
        self.fabric.clear();
        self.index.clear();
        warn!(target = "catalog_relay::context", "all caches cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            domains: self.fabric.stats(),
            index: IndexStats {
                users: self.index.user_count(),
                keys: self.index.key_count(),
            },
        }
    }

    pub fn cache_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Start pruning the invalidation index on the configured interval.
    pub fn spawn_index_sweeper(&self) -> JoinHandle<()> {
        cache::spawn_index_sweeper(
            self.index.clone(),
            self.fabric.clone(),
            self.config.index_sweep_interval(),
        )
    }
}
