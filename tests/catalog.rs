mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use catalog_relay::application::error::RelayError;
use catalog_relay::auth::AuthSettings;
use catalog_relay::cache::{CacheConfig, CacheDomain, DomainLimits, keys, sweep_once};
use catalog_relay::domain::catalog::{CatalogResult, Meta};

use support::Harness;

fn catalog(prefix: &str, count: usize) -> CatalogResult {
    CatalogResult::new(
        (0..count)
            .map(|i| Meta::movie(format!("{prefix}:{i}"), format!("{prefix} {i}")))
            .collect(),
    )
}

async fn page(
    h: &Harness,
    fetches: &Arc<AtomicUsize>,
    user_id: &str,
    key: &str,
    skip: usize,
) -> Vec<Meta> {
    let fetches = fetches.clone();
    h.relay
        .catalogs()
        .user_catalog_page(user_id, key, skip, 10, || async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RelayError>(catalog("watchlist", 37))
        })
        .await
        .expect("page")
}

#[tokio::test]
async fn catalog_is_fetched_once_and_sliced_per_request() {
    let h = Harness::new();
    let fetches = Arc::new(AtomicUsize::new(0));
    let key = keys::user_catalog_key("u1", "watchlist", "default");

    let first = page(&h, &fetches, "u1", &key, 0).await;
    let fourth = page(&h, &fetches, "u1", &key, 30).await;
    let beyond = page(&h, &fetches, "u1", &key, 40).await;

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(first.len(), 10);
    assert_eq!(first[0].name, "watchlist 0");
    assert_eq!(fourth.len(), 7);
    assert_eq!(fourth[6].name, "watchlist 36");
    assert!(beyond.is_empty());

    let metrics = h.relay.cache_metrics().domain(CacheDomain::UserCatalogs);
    assert_eq!(metrics.misses, 1);
    assert_eq!(metrics.hits, 2);
}

#[tokio::test]
async fn preference_change_forces_next_read_to_miss() {
    let h = Harness::new();
    let fetches = Arc::new(AtomicUsize::new(0));
    let watchlist = keys::user_catalog_key("u1", "watchlist", "default");
    let diary = keys::user_catalog_key("u1", "diary", "default");

    page(&h, &fetches, "u1", &watchlist, 0).await;
    page(&h, &fetches, "u1", &diary, 0).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 2);

    assert_eq!(h.relay.preferences_changed("u1"), 2);
    assert!(h.relay.index().keys_for("u1").is_empty());

    page(&h, &fetches, "u1", &watchlist, 0).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn preference_change_leaves_shared_catalogs_alone() {
    let h = Harness::new();
    let shared = keys::shared_catalog_key("popular", "week");
    h.relay
        .catalogs()
        .set_shared_catalog(&shared, catalog("popular", 20), 0, 10);
    page(&h, &Arc::new(AtomicUsize::new(0)), "u1", "user:u1:watchlist", 0).await;

    h.relay.preferences_changed("u1");

    let cached = h
        .relay
        .catalogs()
        .shared_catalog_cached(&shared, 10, 10)
        .expect("shared catalog survives");
    assert_eq!(cached[0].name, "popular 10");
}

#[tokio::test]
async fn expired_catalog_is_refetched() {
    let h = Harness::new();
    let fetches = Arc::new(AtomicUsize::new(0));

    page(&h, &fetches, "u1", "user:u1:watchlist", 0).await;
    h.clock.advance(Duration::from_secs(299));
    page(&h, &fetches, "u1", "user:u1:watchlist", 0).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    h.clock.advance(Duration::from_secs(1));
    page(&h, &fetches, "u1", "user:u1:watchlist", 0).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_fetch_caches_nothing() {
    let h = Harness::new();

    let err = h
        .relay
        .catalogs()
        .user_catalog_page("u1", "user:u1:watchlist", 0, 10, || async {
            Err(RelayError::unavailable("status 502"))
        })
        .await
        .expect_err("fetch failed");

    assert!(matches!(err, RelayError::Unavailable { .. }));
    assert!(h.relay.index().keys_for("u1").is_empty());
    assert!(!h.relay.fabric().user_catalogs().has("user:u1:watchlist"));
}

#[tokio::test]
async fn sweep_prunes_index_entries_of_expired_catalogs() {
    let h = Harness::new();
    h.relay
        .catalogs()
        .set_user_catalog("u1", "user:u1:watchlist", catalog("w", 3), 0, 10);
    h.relay
        .catalogs()
        .set_user_catalog("u2", "user:u2:watchlist", catalog("w", 3), 0, 10);

    assert_eq!(sweep_once(h.relay.index(), h.relay.fabric()), 0);

    h.clock.advance(Duration::from_secs(301));
    h.relay
        .catalogs()
        .set_user_catalog("u2", "user:u2:diary", catalog("d", 3), 0, 10);

    assert_eq!(sweep_once(h.relay.index(), h.relay.fabric()), 2);
    assert_eq!(h.relay.index().user_count(), 1);
    assert_eq!(h.relay.index().keys_for("u2").len(), 1);
}

#[tokio::test]
async fn index_covers_catalogs_after_lru_eviction() {
    let mut config = CacheConfig::default();
    config.user_catalogs = DomainLimits::new(2, 300);
    let h = Harness::build(config, AuthSettings::default());

    for list in ["a", "b", "c"] {
        h.relay.catalogs().set_user_catalog(
            "u1",
            &format!("user:u1:{list}"),
            catalog(list, 3),
            0,
            10,
        );
    }

    let stats = h.relay.cache_stats();
    assert_eq!(stats.domains["user_catalogs"].size, 2);
    assert_eq!(stats.index.keys, 3);
    assert_eq!(h.relay.preferences_changed("u1"), 2);
    assert_eq!(
        h.relay
            .cache_metrics()
            .domain(CacheDomain::UserCatalogs)
            .evictions,
        1
    );
}

#[tokio::test]
async fn concurrent_sweeps_never_drop_a_freshly_written_key() {
    let mut config = CacheConfig::default();
    config.user_catalogs = DomainLimits::new(50_000, 300);
    let h = Harness::build(config, AuthSettings::default());

    let stop = Arc::new(AtomicBool::new(false));
    let sweeper = {
        let relay = h.relay.clone();
        let stop = stop.clone();
        std::thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                sweep_once(relay.index(), relay.fabric());
            }
        })
    };

    let keys: Vec<String> = (0..20_000).map(|i| format!("user:u1:list-{i}")).collect();
    for key in &keys {
        h.relay
            .catalogs()
            .set_user_catalog("u1", key, CatalogResult::default(), 0, 10);
    }
    stop.store(true, Ordering::Relaxed);
    sweeper.join().expect("sweeper thread");

    let indexed = h.relay.index().keys_for("u1");
    let missing = keys
        .iter()
        .filter(|key| h.relay.fabric().user_catalogs().has(key) && !indexed.contains(*key))
        .count();
    assert_eq!(missing, 0, "live keys missing from index");
    assert_eq!(h.relay.preferences_changed("u1"), keys.len());
}
