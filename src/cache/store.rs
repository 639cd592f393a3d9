//! Time-bounded LRU store.
//!
//! One `TimedStore` backs each cache domain. Entries carry their own expiry;
//! an expired entry reads as a miss even while it is still resident, and is
//! dropped lazily on access or when room is needed.

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::trace;

use crate::clock::SharedClock;

use super::keys::CacheDomain;
use super::lock::{rw_read, rw_write};
use super::metrics::CacheMetrics;

const SOURCE: &str = "cache::store";

/// A cached value with its insertion and expiry instants.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// String-keyed LRU cache with a fixed per-entry TTL.
pub struct TimedStore<V> {
    domain: CacheDomain,
    ttl: Duration,
    clock: SharedClock,
    metrics: Arc<CacheMetrics>,
    entries: RwLock<LruCache<String, CacheEntry<V>>>,
}

impl<V: Clone> TimedStore<V> {
    pub fn new(
        domain: CacheDomain,
        max_entries: NonZeroUsize,
        ttl: Duration,
        clock: SharedClock,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            domain,
            ttl,
            clock,
            metrics,
            entries: RwLock::new(LruCache::new(max_entries)),
        }
    }

    /// Look up a live entry, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");

        let lookup = entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                self.metrics.record_hit(self.domain);
                trace!(domain = %self.domain, key, "cache hit");
                Some(value)
            }
            Some(None) => {
                entries.pop(key);
                self.metrics.record_miss(self.domain);
                trace!(domain = %self.domain, key, "cache miss (expired)");
                None
            }
            None => {
                self.metrics.record_miss(self.domain);
                trace!(domain = %self.domain, key, "cache miss");
                None
            }
        }
    }

    /// Look up a live entry without touching recency or counters.
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        rw_read(&self.entries, SOURCE, "peek")
            .peek(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Insert or replace `key`.
    ///
    /// When a new key arrives at capacity, expired entries are purged first;
    /// if the store is still full the least recently used live entry is
    /// evicted and its key returned.
    pub fn set(&self, key: impl Into<String>, value: V) -> Option<String> {
        let key = key.into();
        let now = self.clock.now();
        let entry = CacheEntry {
            value,
            inserted_at: now,
            expires_at: now + self.ttl,
        };

        let mut entries = rw_write(&self.entries, SOURCE, "set");
        let replacing = entries.contains(key.as_str());
        if !replacing && entries.len() >= entries.cap().get() {
            purge_expired_locked(&mut entries, now);
        }

        let displaced = entries.push(key, entry);
        if replacing {
            return None;
        }

        displaced.map(|(evicted_key, _)| {
            self.metrics.record_eviction(self.domain);
            trace!(domain = %self.domain, key = %evicted_key, "cache eviction");
            evicted_key
        })
    }

    /// Whether a live entry exists. Does not refresh recency.
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        rw_read(&self.entries, SOURCE, "has")
            .peek(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Remove `key`; returns whether a live entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let now = self.clock.now();
        rw_write(&self.entries, SOURCE, "delete")
            .pop(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Remove `key` only if its live value satisfies `predicate`.
    pub fn delete_if(&self, key: &str, predicate: impl FnOnce(&V) -> bool) -> bool {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "delete_if");
        let matches = entries
            .peek(key)
            .is_some_and(|entry| entry.is_live(now) && predicate(&entry.value));
        if matches {
            entries.pop(key);
        }
        matches
    }

    /// Mutate the live value at `key` in place if it satisfies `predicate`.
    ///
    /// Expiry and recency are left untouched.
    pub fn update_if(
        &self,
        key: &str,
        predicate: impl FnOnce(&V) -> bool,
        update: impl FnOnce(&mut V),
    ) -> bool {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "update_if");
        match entries.peek_mut(key) {
            Some(entry) if entry.is_live(now) && predicate(&entry.value) => {
                update(&mut entry.value);
                true
            }
            _ => false,
        }
    }

    /// Drop every expired entry still resident. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        purge_expired_locked(&mut rw_write(&self.entries, SOURCE, "purge_expired"), now)
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    /// Number of resident entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max(&self) -> usize {
        rw_read(&self.entries, SOURCE, "max").cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn domain(&self) -> CacheDomain {
        self.domain
    }
}

fn purge_expired_locked<V>(entries: &mut LruCache<String, CacheEntry<V>>, now: Instant) -> usize {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, entry)| !entry.is_live(now))
        .map(|(key, _)| key.clone())
        .collect();
    for key in &expired {
        entries.pop(key.as_str());
    }
    expired.len()
}
