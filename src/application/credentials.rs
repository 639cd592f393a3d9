//! Port to the persistent store of long-lived user credentials.
//!
//! Storage and encryption live outside this crate; the relay only reads the
//! current refresh token and writes back rotated ones.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored credentials for user `{0}`")]
    UnknownUser(String),
    #[error("credential store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(err: impl fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Rotated credential state to persist after a delegated refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub refresh_token: String,
    pub expires_at: OffsetDateTime,
}

impl fmt::Debug for CredentialUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialUpdate")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current (decrypted) refresh token for the user.
    async fn refresh_token(&self, user_id: &str) -> Result<String, StoreError>;

    async fn update_user(
        &self,
        user_id: &str,
        update: CredentialUpdate,
    ) -> Result<(), StoreError>;
}
