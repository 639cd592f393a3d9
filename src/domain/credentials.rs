//! Access credentials held in memory.
//!
//! `Debug` is implemented by hand so tokens never reach log output.

use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle state of the application credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCredentialState {
    /// No credential, or invalidated after a rejection.
    Absent,
    /// Usable as-is.
    Valid,
    /// Inside the safety margin; the next request refreshes it first.
    Expiring,
}

/// The process-wide credential representing the service itself.
#[derive(Clone)]
pub struct AppCredential {
    pub token: String,
    pub expires_at: Instant,
}

impl AppCredential {
    /// Usable while `now < expires_at - margin`.
    pub fn is_usable(&self, now: Instant, margin: Duration) -> bool {
        now + margin < self.expires_at
    }

    pub fn state(&self, now: Instant, margin: Duration) -> AppCredentialState {
        if self.is_usable(now, margin) {
            AppCredentialState::Valid
        } else {
            AppCredentialState::Expiring
        }
    }
}

impl fmt::Debug for AppCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// An access/refresh token pair acting on behalf of one user.
#[derive(Clone)]
pub struct DelegatedCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Instant,
}

impl DelegatedCredential {
    /// The cache TTL only bounds memory; this expiry decides validity.
    pub fn is_usable(&self, now: Instant, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

impl fmt::Debug for DelegatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedCredential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_credential_enters_margin_before_expiry() {
        let issued = Instant::now();
        let credential = AppCredential {
            token: "t".to_string(),
            expires_at: issued + Duration::from_secs(120),
        };
        let margin = Duration::from_secs(60);

        assert_eq!(
            credential.state(issued + Duration::from_secs(30), margin),
            AppCredentialState::Valid
        );
        assert_eq!(
            credential.state(issued + Duration::from_secs(60), margin),
            AppCredentialState::Expiring
        );
        assert_eq!(
            credential.state(issued + Duration::from_secs(61), margin),
            AppCredentialState::Expiring
        );
    }

    #[test]
    fn debug_output_hides_tokens() {
        let credential = DelegatedCredential {
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
            expires_at: Instant::now(),
        };
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
