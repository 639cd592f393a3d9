//! Two-tier credential lifecycle.
//!
//! The application credential authenticates the relay itself; delegated
//! credentials act on behalf of one user. Both are refreshed ahead of expiry,
//! and any upstream call rejected for credentials is retried exactly once
//! with a freshly obtained token.

mod app;
mod delegated;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::application::credentials::CredentialStore;
use crate::application::error::RelayError;
use crate::application::upstream::{CatalogUpstream, UpstreamError};
use crate::cache::{CacheFabric, CacheMetrics, CredentialKind};
use crate::clock::SharedClock;
use crate::domain::credentials::AppCredential;

pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSettings {
    /// Tokens are treated as expired this long before their real expiry.
    pub expiry_margin: Duration,
    /// Upper bound on every upstream call made through the manager.
    pub upstream_timeout: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            expiry_margin: DEFAULT_EXPIRY_MARGIN,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

/// Identity an upstream call is made as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    App,
    User(String),
}

impl Principal {
    fn kind(&self) -> CredentialKind {
        match self {
            Principal::App => CredentialKind::App,
            Principal::User(_) => CredentialKind::Delegated,
        }
    }
}

pub struct CredentialManager {
    upstream: Arc<dyn CatalogUpstream>,
    store: Arc<dyn CredentialStore>,
    fabric: Arc<CacheFabric>,
    metrics: Arc<CacheMetrics>,
    clock: SharedClock,
    settings: AuthSettings,
    /// Held across the token exchange, so concurrent callers share one.
    app: Mutex<Option<AppCredential>>,
    user_gates: DashMap<String, Arc<Mutex<()>>>,
}

impl CredentialManager {
    pub fn new(
        upstream: Arc<dyn CatalogUpstream>,
        store: Arc<dyn CredentialStore>,
        fabric: Arc<CacheFabric>,
        metrics: Arc<CacheMetrics>,
        clock: SharedClock,
        settings: AuthSettings,
    ) -> Self {
        Self {
            upstream,
            store,
            fabric,
            metrics,
            clock,
            settings,
            app: Mutex::new(None),
            user_gates: DashMap::new(),
        }
    }

    /// Run `call` with an application token, retrying once after a rejection.
    pub async fn call_with_app_token<T, F, Fut>(&self, call: F) -> Result<T, RelayError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        self.call_as(&Principal::App, call).await
    }

    /// Run `call` with the user's delegated token, retrying once after a
    /// rejection.
    pub async fn call_with_user_token<T, F, Fut>(
        &self,
        user_id: &str,
        call: F,
    ) -> Result<T, RelayError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        self.call_as(&Principal::User(user_id.to_string()), call).await
    }

    pub(crate) async fn call_as<T, F, Fut>(
        &self,
        principal: &Principal,
        call: F,
    ) -> Result<T, RelayError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let token = self.token_for(principal).await?;
        match self.bounded(call(token.clone())).await {
            Err(UpstreamError::Rejected) => {
                self.on_rejected(principal, &token).await;
            }
            other => return other.map_err(RelayError::from),
        }

        let token = self.token_for(principal).await?;
        match self.bounded(call(token.clone())).await {
            Err(UpstreamError::Rejected) => {
                self.on_rejected(principal, &token).await;
                Err(RelayError::Authentication)
            }
            other => other.map_err(RelayError::from),
        }
    }

    async fn token_for(&self, principal: &Principal) -> Result<String, RelayError> {
        match principal {
            Principal::App => self.app_token().await,
            Principal::User(user_id) => self.user_token(user_id).await,
        }
    }

    async fn on_rejected(&self, principal: &Principal, token: &str) {
        self.metrics.record_auth_rejected(principal.kind());
        warn!(
            target = "catalog_relay::auth",
            kind = principal.kind().as_str(),
            "upstream rejected credential"
        );
        match principal {
            Principal::App => self.invalidate_app_token(token).await,
            Principal::User(user_id) => self.invalidate_user_token(user_id, token),
        }
    }

    /// Bound an upstream call by the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, UpstreamError>>,
    ) -> Result<T, UpstreamError> {
        let limit = self.settings.upstream_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(UpstreamError::Timeout(limit)))
    }
}

/// Handle for making upstream calls as one principal.
#[derive(Clone)]
pub struct AuthenticatedClient {
    manager: Arc<CredentialManager>,
    principal: Principal,
}

impl AuthenticatedClient {
    pub fn new(manager: Arc<CredentialManager>, principal: Principal) -> Self {
        Self { manager, principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> Option<&str> {
        match &self.principal {
            Principal::App => None,
            Principal::User(user_id) => Some(user_id),
        }
    }

    /// See [`CredentialManager::call_with_app_token`].
    pub async fn call<T, F, Fut>(&self, call: F) -> Result<T, RelayError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        self.manager.call_as(&self.principal, call).await
    }
}
