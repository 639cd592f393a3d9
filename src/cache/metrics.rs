//! Hit/miss/eviction counters.
//!
//! Each event is counted twice: in process-local atomics that back the
//! read-only [`MetricsSnapshot`], and through the `metrics` facade so an
//! installed recorder can export it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, histogram};
use serde::Serialize;

use super::keys::CacheDomain;

pub const METRIC_CACHE_HIT: &str = "relay_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "relay_cache_miss_total";
pub const METRIC_CACHE_EVICT: &str = "relay_cache_evict_total";
pub const METRIC_TOKEN_REFRESH: &str = "relay_token_refresh_total";
pub const METRIC_TOKEN_REFRESH_MS: &str = "relay_token_refresh_ms";
pub const METRIC_AUTH_REJECTED: &str = "relay_auth_rejected_total";

/// Which credential tier an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    App,
    Delegated,
}

impl CredentialKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            CredentialKind::App => "app",
            CredentialKind::Delegated => "delegated",
        }
    }
}

#[derive(Default)]
struct DomainCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Default)]
struct CredentialCounters {
    refreshes: AtomicU64,
    rejections: AtomicU64,
}

/// Process-wide cache and credential counters.
#[derive(Default)]
pub struct CacheMetrics {
    domains: [DomainCounters; CacheDomain::ALL.len()],
    app: CredentialCounters,
    delegated: CredentialCounters,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, domain: CacheDomain) {
        self.domains[domain.index()]
            .hits
            .fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_HIT, "domain" => domain.as_str()).increment(1);
    }

    pub fn record_miss(&self, domain: CacheDomain) {
        self.domains[domain.index()]
            .misses
            .fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_MISS, "domain" => domain.as_str()).increment(1);
    }

    pub fn record_eviction(&self, domain: CacheDomain) {
        self.domains[domain.index()]
            .evictions
            .fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_CACHE_EVICT, "domain" => domain.as_str()).increment(1);
    }

    pub fn record_token_refresh(&self, kind: CredentialKind, elapsed: Duration) {
        self.credential(kind)
            .refreshes
            .fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_TOKEN_REFRESH, "kind" => kind.as_str()).increment(1);
        histogram!(METRIC_TOKEN_REFRESH_MS, "kind" => kind.as_str())
            .record(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn record_auth_rejected(&self, kind: CredentialKind) {
        self.credential(kind)
            .rejections
            .fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_AUTH_REJECTED, "kind" => kind.as_str()).increment(1);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut domains = BTreeMap::new();
        let mut total = DomainMetrics::default();

        for domain in CacheDomain::ALL {
            let counters = &self.domains[domain.index()];
            let metrics = DomainMetrics::new(
                counters.hits.load(Ordering::Relaxed),
                counters.misses.load(Ordering::Relaxed),
                counters.evictions.load(Ordering::Relaxed),
            );
            total = DomainMetrics::new(
                total.hits + metrics.hits,
                total.misses + metrics.misses,
                total.evictions + metrics.evictions,
            );
            domains.insert(domain.as_str(), metrics);
        }

        MetricsSnapshot {
            domains,
            total,
            credentials: CredentialMetrics {
                app_refreshes: self.app.refreshes.load(Ordering::Relaxed),
                app_rejections: self.app.rejections.load(Ordering::Relaxed),
                delegated_refreshes: self.delegated.refreshes.load(Ordering::Relaxed),
                delegated_rejections: self.delegated.rejections.load(Ordering::Relaxed),
            },
        }
    }

    fn credential(&self, kind: CredentialKind) -> &CredentialCounters {
        match kind {
            CredentialKind::App => &self.app,
            CredentialKind::Delegated => &self.delegated,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DomainMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Hits over lookups; zero when nothing has been looked up yet.
    pub hit_rate: f64,
}

impl DomainMetrics {
    fn new(hits: u64, misses: u64, evictions: u64) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };
        Self {
            hits,
            misses,
            evictions,
            hit_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CredentialMetrics {
    pub app_refreshes: u64,
    pub app_rejections: u64,
    pub delegated_refreshes: u64,
    pub delegated_rejections: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub domains: BTreeMap<&'static str, DomainMetrics>,
    pub total: DomainMetrics,
    pub credentials: CredentialMetrics,
}

impl MetricsSnapshot {
    pub fn domain(&self, domain: CacheDomain) -> DomainMetrics {
        self.domains
            .get(domain.as_str())
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_zero_without_lookups() {
        let metrics = CacheMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total.hit_rate, 0.0);
        assert_eq!(snapshot.domains.len(), CacheDomain::ALL.len());
    }

    #[test]
    fn snapshot_aggregates_per_domain_counts() {
        let metrics = CacheMetrics::new();
        metrics.record_hit(CacheDomain::Films);
        metrics.record_hit(CacheDomain::Films);
        metrics.record_hit(CacheDomain::Films);
        metrics.record_miss(CacheDomain::Films);
        metrics.record_miss(CacheDomain::Ratings);
        metrics.record_eviction(CacheDomain::Posters);

        let snapshot = metrics.snapshot();
        let films = snapshot.domain(CacheDomain::Films);
        assert_eq!(films.hits, 3);
        assert_eq!(films.misses, 1);
        assert!((films.hit_rate - 0.75).abs() < f64::EPSILON);

        assert_eq!(snapshot.total.hits, 3);
        assert_eq!(snapshot.total.misses, 2);
        assert_eq!(snapshot.total.evictions, 1);
    }

    #[test]
    fn credential_counters_are_kept_per_kind() {
        let metrics = CacheMetrics::new();
        metrics.record_token_refresh(CredentialKind::App, Duration::from_millis(5));
        metrics.record_auth_rejected(CredentialKind::Delegated);

        let credentials = metrics.snapshot().credentials;
        assert_eq!(credentials.app_refreshes, 1);
        assert_eq!(credentials.delegated_refreshes, 0);
        assert_eq!(credentials.delegated_rejections, 1);
    }
}
