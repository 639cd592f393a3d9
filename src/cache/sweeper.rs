//! Periodic pruning of the per-user invalidation index.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::fabric::CacheFabric;
use super::index::UserKeyIndex;

/// Drop index entries whose catalog is no longer live in the fabric.
///
/// Only the index is touched; domain entries age out on their own.
pub fn sweep_once(index: &UserKeyIndex, fabric: &CacheFabric) -> usize {
    let removed = index.retain_live(|key| fabric.user_catalogs().has(key));
    if removed > 0 {
        debug!(
            target = "catalog_relay::cache::sweeper",
            removed,
            users = index.user_count(),
            "pruned dead keys from invalidation index"
        );
    }
    removed
}

/// Run [`sweep_once`] every `every` until the handle is aborted.
pub fn spawn_index_sweeper(
    index: Arc<UserKeyIndex>,
    fabric: Arc<CacheFabric>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            sweep_once(&index, &fabric);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::metrics::CacheMetrics;
    use crate::clock::ManualClock;
    use crate::domain::catalog::CatalogResult;

    #[test]
    fn sweep_removes_only_dead_keys() {
        let clock = ManualClock::shared();
        let fabric = CacheFabric::new(
            &CacheConfig::default(),
            clock.clone(),
            Arc::new(CacheMetrics::new()),
        );
        let index = UserKeyIndex::new();

        index.record("u1", "catalog:u1:a");
        fabric
            .user_catalogs()
            .set("catalog:u1:a", Arc::new(CatalogResult::default()));
        index.record("u1", "catalog:u1:never-written");

        assert_eq!(sweep_once(&index, &fabric), 1);
        assert_eq!(index.key_count(), 1);

        clock.advance(Duration::from_secs(301));
        assert_eq!(sweep_once(&index, &fabric), 1);
        assert_eq!(index.user_count(), 0);
    }
}
