//! Per-user invalidation index.
//!
//! Tracks which cache keys were written on behalf of each user so all of a
//! user's cached catalogs can be dropped without scanning the store. The
//! index may name keys that have already expired; it must never miss a live
//! one, so [`UserKeyIndex::record_with`] writes the value while the index
//! write lock is held and a concurrent [`UserKeyIndex::retain_live`] cannot
//! observe the key before its value lands.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::index";

#[derive(Default)]
pub struct UserKeyIndex {
    user_to_keys: RwLock<HashMap<String, HashSet<String>>>,
}

impl UserKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` holds data produced for `user_id`.
    pub fn record(&self, user_id: &str, key: impl Into<String>) {
        rw_write(&self.user_to_keys, SOURCE, "record")
            .entry(user_id.to_string())
            .or_default()
            .insert(key.into());
    }

    /// Record `key` for `user_id` and run `write` before releasing the index.
    ///
    /// Lock order is index then store; `retain_live` follows the same order.
    pub fn record_with<R>(
        &self,
        user_id: &str,
        key: impl Into<String>,
        write: impl FnOnce() -> R,
    ) -> R {
        let mut index = rw_write(&self.user_to_keys, SOURCE, "record_with");
        index
            .entry(user_id.to_string())
            .or_default()
            .insert(key.into());
        write()
    }

    /// Keys currently recorded for a user.
    pub fn keys_for(&self, user_id: &str) -> HashSet<String> {
        rw_read(&self.user_to_keys, SOURCE, "keys_for")
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove and return every key recorded for a user.
    pub fn take(&self, user_id: &str) -> HashSet<String> {
        rw_write(&self.user_to_keys, SOURCE, "take")
            .remove(user_id)
            .unwrap_or_default()
    }

    /// Keep only keys for which `is_live` holds; users left with no keys are
    /// dropped. Returns the number of keys removed.
    pub fn retain_live(&self, mut is_live: impl FnMut(&str) -> bool) -> usize {
        let mut index = rw_write(&self.user_to_keys, SOURCE, "retain_live");
        let mut removed = 0;
        index.retain(|_, keys| {
            let before = keys.len();
            keys.retain(|key| is_live(key));
            removed += before - keys.len();
            !keys.is_empty()
        });
        removed
    }

    /// Number of users with at least one recorded key.
    pub fn user_count(&self) -> usize {
        rw_read(&self.user_to_keys, SOURCE, "user_count").len()
    }

    /// Total number of recorded keys across users.
    pub fn key_count(&self) -> usize {
        rw_read(&self.user_to_keys, SOURCE, "key_count")
            .values()
            .map(HashSet::len)
            .sum()
    }

    pub fn clear(&self) {
        rw_write(&self.user_to_keys, SOURCE, "clear").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_lookup() {
        let index = UserKeyIndex::new();
        index.record("u1", "catalog:u1:watchlist");
        index.record("u1", "catalog:u1:diary");
        index.record("u2", "catalog:u2:watchlist");

        let keys = index.keys_for("u1");
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("catalog:u1:diary"));
        assert_eq!(index.user_count(), 2);
        assert_eq!(index.key_count(), 3);
    }

    #[test]
    fn recording_same_key_twice_is_deduplicated() {
        let index = UserKeyIndex::new();
        index.record("u1", "k");
        index.record("u1", "k");
        assert_eq!(index.key_count(), 1);
    }

    #[test]
    fn take_is_idempotent() {
        let index = UserKeyIndex::new();
        index.record("u1", "k");

        assert_eq!(index.take("u1").len(), 1);
        assert!(index.take("u1").is_empty());
        assert!(index.keys_for("u1").is_empty());
        assert_eq!(index.user_count(), 0);
    }

    #[test]
    fn record_with_runs_write_while_key_is_recorded() {
        let index = UserKeyIndex::new();
        let seen = index.record_with("u1", "k", || 7);
        assert_eq!(seen, 7);
        assert!(index.keys_for("u1").contains("k"));
    }

    #[test]
    fn retain_live_drops_dead_keys_and_empty_users() {
        let index = UserKeyIndex::new();
        index.record("u1", "live");
        index.record("u1", "dead-1");
        index.record("u2", "dead-2");

        let removed = index.retain_live(|key| key == "live");

        assert_eq!(removed, 2);
        assert_eq!(index.user_count(), 1);
        assert_eq!(index.keys_for("u1").len(), 1);
        assert!(index.keys_for("u2").is_empty());
    }
}
