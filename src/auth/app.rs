use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::application::error::RelayError;
use crate::application::upstream::UpstreamError;
use crate::cache::CredentialKind;
use crate::domain::credentials::{AppCredential, AppCredentialState};

use super::CredentialManager;

impl CredentialManager {
    /// A valid application token, exchanging client credentials if needed.
    ///
    /// Callers arriving while an exchange is in flight wait on it and receive
    /// the same token.
    #[instrument(skip(self), target = "catalog_relay::auth")]
    pub async fn app_token(&self) -> Result<String, RelayError> {
        let mut slot = self.app.lock().await;
        let now = self.clock.now();
        let margin = self.settings.expiry_margin;

        if let Some(current) = slot.as_ref().filter(|cred| cred.is_usable(now, margin)) {
            return Ok(current.token.clone());
        }

        match self.exchange_app_credentials().await {
            Ok(fresh) => {
                let token = fresh.token.clone();
                *slot = Some(fresh);
                Ok(token)
            }
            Err(err) => match slot.as_ref().filter(|cred| now < cred.expires_at) {
                // Inside the margin but not yet expired: keep serving it.
                Some(current) => {
                    warn!(
                        target = "catalog_relay::auth",
                        error = %err,
                        "app token refresh failed; reusing token until expiry"
                    );
                    Ok(current.token.clone())
                }
                None => Err(err.into()),
            },
        }
    }

    pub async fn app_credential_state(&self) -> AppCredentialState {
        let now = self.clock.now();
        match self.app.lock().await.as_ref() {
            Some(cred) => cred.state(now, self.settings.expiry_margin),
            None => AppCredentialState::Absent,
        }
    }

    /// Drop the application token if it is still the one that was rejected.
    pub(super) async fn invalidate_app_token(&self, rejected: &str) {
        let mut slot = self.app.lock().await;
        if slot.as_ref().is_some_and(|cred| cred.token == rejected) {
            *slot = None;
        }
    }

    async fn exchange_app_credentials(&self) -> Result<AppCredential, UpstreamError> {
        let started = Instant::now();
        let grant = self
            .bounded(self.upstream.exchange_app_credentials())
            .await?;
        self.metrics
            .record_token_refresh(CredentialKind::App, started.elapsed());
        info!(
            target = "catalog_relay::auth",
            expires_in_secs = grant.expires_in.as_secs(),
            "app token acquired"
        );
        Ok(AppCredential {
            token: grant.access_token,
            expires_at: self.clock.now() + grant.expires_in,
        })
    }
}
