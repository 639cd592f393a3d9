//! Catalog pagination over whole cached result sets.
//!
//! A catalog is fetched and cached in full once; every page request slices
//! the cached result. Per-user catalogs are recorded in the invalidation index
//! so a preference change can drop all of them at once.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::application::error::RelayError;
use crate::cache::{CacheFabric, UserKeyIndex};
use crate::domain::catalog::{CatalogResult, Meta};

pub struct CatalogService {
    fabric: Arc<CacheFabric>,
    index: Arc<UserKeyIndex>,
}

impl CatalogService {
    pub fn new(fabric: Arc<CacheFabric>, index: Arc<UserKeyIndex>) -> Self {
        Self { fabric, index }
    }

    /// Page of a cached per-user catalog, or `None` on a miss.
    pub fn user_catalog_cached(
        &self,
        cache_key: &str,
        skip: usize,
        page_size: usize,
    ) -> Option<Vec<Meta>> {
        self.fabric
            .user_catalogs()
            .get(cache_key)
            .map(|full| full.page(skip, page_size))
    }

    /// Cache a full per-user catalog and return the requested page of it.
    pub fn set_user_catalog(
        &self,
        user_id: &str,
        cache_key: &str,
        full: CatalogResult,
        skip: usize,
        page_size: usize,
    ) -> Vec<Meta> {
        let page = full.page(skip, page_size);
        self.index.record_with(user_id, cache_key, || {
            self.fabric.user_catalogs().set(cache_key, Arc::new(full));
        });
        page
    }

    /// Page of a cached shared catalog, or `None` on a miss.
    pub fn shared_catalog_cached(
        &self,
        cache_key: &str,
        skip: usize,
        page_size: usize,
    ) -> Option<Vec<Meta>> {
        self.fabric
            .catalog_pages()
            .get(cache_key)
            .map(|full| full.page(skip, page_size))
    }

    pub fn set_shared_catalog(
        &self,
        cache_key: &str,
        full: CatalogResult,
        skip: usize,
        page_size: usize,
    ) -> Vec<Meta> {
        let page = full.page(skip, page_size);
        self.fabric.catalog_pages().set(cache_key, Arc::new(full));
        page
    }

    /// Serve a page of a per-user catalog, fetching the whole catalog on a miss.
    pub async fn user_catalog_page<F, Fut>(
        &self,
        user_id: &str,
        cache_key: &str,
        skip: usize,
        page_size: usize,
        fetch: F,
    ) -> Result<Vec<Meta>, RelayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CatalogResult, RelayError>>,
    {
        if let Some(page) = self.user_catalog_cached(cache_key, skip, page_size) {
            return Ok(page);
        }
        let full = fetch().await?;
        debug!(
            target = "catalog_relay::catalog",
            user_id,
            cache_key,
            items = full.len(),
            "user catalog fetched"
        );
        Ok(self.set_user_catalog(user_id, cache_key, full, skip, page_size))
    }

    /// Serve a page of a shared catalog, fetching the whole catalog on a miss.
    pub async fn shared_catalog_page<F, Fut>(
        &self,
        cache_key: &str,
        skip: usize,
        page_size: usize,
        fetch: F,
    ) -> Result<Vec<Meta>, RelayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CatalogResult, RelayError>>,
    {
        if let Some(page) = self.shared_catalog_cached(cache_key, skip, page_size) {
            return Ok(page);
        }
        let full = fetch().await?;
        Ok(self.set_shared_catalog(cache_key, full, skip, page_size))
    }

    /// Drop every cached catalog recorded for a user. Idempotent.
    pub fn invalidate_user_catalogs(&self, user_id: &str) -> usize {
        let keys = self.index.take(user_id);
        let removed = keys
            .iter()
            .filter(|key| self.fabric.user_catalogs().delete(key))
            .count();
        debug!(
            target = "catalog_relay::catalog",
            user_id,
            keys = keys.len(),
            removed,
            "invalidated user catalogs"
        );
        removed
    }
}
