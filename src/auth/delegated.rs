use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::application::credentials::CredentialUpdate;
use crate::application::error::RelayError;
use crate::application::upstream::UpstreamError;
use crate::cache::CredentialKind;
use crate::cache::keys::credential_key;
use crate::domain::credentials::DelegatedCredential;

use super::CredentialManager;

impl CredentialManager {
    /// A valid access token for `user_id`, refreshing it if needed.
    ///
    /// Refreshes for one user are serialized; a caller that waited on another
    /// caller's refresh reuses its result.
    #[instrument(skip(self), target = "catalog_relay::auth")]
    pub async fn user_token(&self, user_id: &str) -> Result<String, RelayError> {
        let key = credential_key(user_id);
        if let Some(token) = self.cached_user_token(&key, true) {
            return Ok(token);
        }

        let gate = UserGate::acquire(&self.user_gates, user_id);
        let _refreshing = gate.lock().await;
        match self.cached_user_token(&key, false) {
            Some(token) => Ok(token),
            None => self.refresh_user_token(user_id, &key).await,
        }
    }

    /// Users with a refresh in progress or callers waiting on one.
    pub fn pending_user_refreshes(&self) -> usize {
        self.user_gates.len()
    }

    /// Forget the cached delegated credential for a user.
    ///
    /// The next call refreshes from the persisted refresh token.
    pub fn invalidate_user(&self, user_id: &str) -> bool {
        self.fabric
            .delegated_credentials()
            .delete(&credential_key(user_id))
    }

    /// Expire the cached access token only if it is still the rejected one.
    ///
    /// The entry stays resident so its rotated refresh token is used for the
    /// next refresh instead of the persisted copy.
    pub(super) fn invalidate_user_token(&self, user_id: &str, rejected: &str) {
        let now = self.clock.now();
        self.fabric.delegated_credentials().update_if(
            &credential_key(user_id),
            |cred| cred.access_token == rejected,
            |cred| cred.expires_at = now,
        );
    }

    fn cached_user_token(&self, key: &str, count_lookup: bool) -> Option<String> {
        let store = self.fabric.delegated_credentials();
        let cached = if count_lookup {
            store.get(key)
        } else {
            store.peek(key)
        };
        let now = self.clock.now();
        cached
            .filter(|cred| cred.is_usable(now, self.settings.expiry_margin))
            .map(|cred| cred.access_token)
    }

    async fn refresh_user_token(&self, user_id: &str, key: &str) -> Result<String, RelayError> {
        // A rotated refresh token cached with an expired access token is newer
        // than the persisted one.
        let refresh_token = match self.fabric.delegated_credentials().peek(key) {
            Some(cached) => cached.refresh_token,
            None => self.store.refresh_token(user_id).await?,
        };

        let started = Instant::now();
        let grant = match self
            .bounded(self.upstream.refresh_delegated_credential(&refresh_token))
            .await
        {
            Ok(grant) => grant,
            Err(UpstreamError::Rejected) => {
                self.metrics.record_auth_rejected(CredentialKind::Delegated);
                warn!(
                    target = "catalog_relay::auth",
                    user_id, "refresh token rejected; user must sign in again"
                );
                self.invalidate_user(user_id);
                return Err(RelayError::Authentication);
            }
            Err(err) => return Err(err.into()),
        };
        self.metrics
            .record_token_refresh(CredentialKind::Delegated, started.elapsed());

        let rotated = grant.refresh_token.unwrap_or(refresh_token);
        let credential = DelegatedCredential {
            access_token: grant.access_token,
            refresh_token: rotated.clone(),
            expires_at: self.clock.now() + grant.expires_in,
        };
        let access_token = credential.access_token.clone();
        self.fabric.delegated_credentials().set(key, credential);

        let update = CredentialUpdate {
            refresh_token: rotated,
            expires_at: OffsetDateTime::now_utc() + grant.expires_in,
        };
        if let Err(err) = self.store.update_user(user_id, update).await {
            // The cached credential still carries the rotated token.
            warn!(
                target = "catalog_relay::auth",
                user_id,
                error = %err,
                "failed to persist rotated refresh token"
            );
        }

        info!(
            target = "catalog_relay::auth",
            user_id,
            expires_in_secs = grant.expires_in.as_secs(),
            "delegated token refreshed"
        );
        Ok(access_token)
    }
}

/// Per-user refresh gate, released from the map when the last holder drops.
///
/// Dropping covers cancelled callers as well as completed ones.
struct UserGate<'a> {
    gates: &'a DashMap<String, Arc<Mutex<()>>>,
    user_id: &'a str,
    gate: Arc<Mutex<()>>,
}

impl<'a> UserGate<'a> {
    fn acquire(gates: &'a DashMap<String, Arc<Mutex<()>>>, user_id: &'a str) -> Self {
        let gate = gates.entry(user_id.to_string()).or_default().clone();
        Self {
            gates,
            user_id,
            gate,
        }
    }

    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl Drop for UserGate<'_> {
    fn drop(&mut self) {
        // The map and this guard hold the only references.
        let removed = self
            .gates
            .remove_if(self.user_id, |_, gate| Arc::strong_count(gate) == 2);
        if removed.is_some() {
            debug!(
                target = "catalog_relay::auth",
                user_id = self.user_id,
                "released refresh gate"
            );
        }
    }
}
