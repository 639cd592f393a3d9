//! Process-local credential store.
//!
//! Backs the binary until a persistent store is wired in, and doubles as the
//! store used by integration tests.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::credentials::{CredentialStore, CredentialUpdate, StoreError};

#[derive(Debug, Clone)]
struct StoredCredential {
    refresh_token: String,
    expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: DashMap<String, StoredCredential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a user's refresh token.
    pub fn insert(&self, user_id: impl Into<String>, refresh_token: impl Into<String>) {
        self.users.insert(
            user_id.into(),
            StoredCredential {
                refresh_token: refresh_token.into(),
                expires_at: None,
            },
        );
    }

    pub fn remove(&self, user_id: &str) -> bool {
        self.users.remove(user_id).is_some()
    }

    /// The refresh token currently persisted for a user.
    pub fn stored(&self, user_id: &str) -> Option<String> {
        self.users
            .get(user_id)
            .map(|entry| entry.refresh_token.clone())
    }

    /// Access-token expiry recorded by the last rotation.
    pub fn expires_at(&self, user_id: &str) -> Option<OffsetDateTime> {
        self.users.get(user_id).and_then(|entry| entry.expires_at)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn refresh_token(&self, user_id: &str) -> Result<String, StoreError> {
        self.stored(user_id)
            .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: CredentialUpdate,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))?;
        entry.refresh_token = update.refresh_token;
        entry.expires_at = Some(update.expires_at);
        debug!(
            target = "catalog_relay::infra::credentials",
            user_id, "persisted rotated credential"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let store = MemoryCredentialStore::new();
        let err = store.refresh_token("ghost").await.expect_err("unknown");
        assert!(matches!(err, StoreError::UnknownUser(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn update_replaces_refresh_token() {
        let store = MemoryCredentialStore::new();
        store.insert("u1", "refresh-1");

        let expires_at = OffsetDateTime::now_utc() + Duration::from_secs(3600);
        store
            .update_user(
                "u1",
                CredentialUpdate {
                    refresh_token: "refresh-2".into(),
                    expires_at,
                },
            )
            .await
            .expect("update");

        assert_eq!(store.refresh_token("u1").await.expect("token"), "refresh-2");
        assert_eq!(store.expires_at("u1"), Some(expires_at));
    }

    #[tokio::test]
    async fn update_for_unknown_user_fails() {
        let store = MemoryCredentialStore::new();
        let result = store
            .update_user(
                "ghost",
                CredentialUpdate {
                    refresh_token: "r".into(),
                    expires_at: OffsetDateTime::now_utc(),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::UnknownUser(_))));
    }
}
