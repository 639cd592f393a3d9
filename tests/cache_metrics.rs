mod support;

use std::collections::HashSet;

use catalog_relay::application::upstream::CatalogUpstream;
use catalog_relay::auth::AuthSettings;
use catalog_relay::cache::{CacheConfig, DomainLimits};
use metrics_util::debugging::DebuggingRecorder;
use serial_test::serial;

use support::Harness;

#[tokio::test]
#[serial]
async fn cache_and_credential_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let mut config = CacheConfig::default();
    config.posters = DomainLimits::new(1, 3600);
    let h = Harness::build(config, AuthSettings::default());
    h.store.insert("u1", "refresh-0");

    // Poster hit, miss and eviction.
    let films = h.relay.films();
    films.poster("https://img/one.jpg").await.expect("poster");
    films.poster("https://img/one.jpg").await.expect("poster");
    films.poster("https://img/two.jpg").await.expect("poster");

    // App and delegated refreshes, then one rejection.
    h.relay.credentials().app_token().await.expect("app token");
    h.relay.credentials().user_token("u1").await.expect("user token");
    h.upstream.reject_next(1);
    let upstream = h.upstream.clone();
    h.relay
        .credentials()
        .call_with_app_token(|token| {
            let upstream = upstream.clone();
            async move { upstream.search_member(&token, "someone").await }
        })
        .await
        .expect("retried call");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "relay_cache_hit_total",
        "relay_cache_miss_total",
        "relay_cache_evict_total",
        "relay_token_refresh_total",
        "relay_token_refresh_ms",
        "relay_auth_rejected_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}

#[tokio::test]
#[serial]
async fn snapshot_reports_hit_rate_per_domain() {
    let h = Harness::new();
    let films = h.relay.films();
    for _ in 0..4 {
        films.poster("https://img/one.jpg").await.expect("poster");
    }

    let snapshot = h.relay.cache_metrics();
    let posters = &snapshot.domains["posters"];
    assert_eq!(posters.hits, 3);
    assert_eq!(posters.misses, 1);
    assert!((posters.hit_rate - 0.75).abs() < f64::EPSILON);
    assert_eq!(snapshot.total.hits, 3);
}
