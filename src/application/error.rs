use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{credentials::StoreError, upstream::UpstreamError},
    infra::error::InfraError,
};

/// Internal error detail attached to a response as an extension.
///
/// Never rendered to clients; middleware and tests can read it back.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failure surfaced to callers of the relay.
///
/// Not-found is `Ok(None)`, not an error.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Credentials were rejected even after one refresh, or no credentials
    /// exist for the user. The user must sign in again.
    #[error("upstream rejected the credentials")]
    Authentication,
    #[error("upstream unavailable: {detail}")]
    Unavailable { detail: String },
    #[error(transparent)]
    CredentialStore(#[from] StoreError),
}

impl RelayError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable {
            detail: detail.into(),
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            RelayError::Authentication | RelayError::CredentialStore(StoreError::UnknownUser(_))
        )
    }

    fn status_code(&self) -> StatusCode {
        if self.is_authentication() {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }

    fn presentation_message(&self) -> &'static str {
        if self.is_authentication() {
            "Invalid or expired credentials"
        } else {
            "Service temporarily unavailable"
        }
    }
}

impl From<UpstreamError> for RelayError {
    fn from(error: UpstreamError) -> Self {
        match error {
            UpstreamError::Rejected => RelayError::Authentication,
            UpstreamError::Unavailable(detail) => RelayError::Unavailable { detail },
            timeout @ UpstreamError::Timeout(_) => RelayError::unavailable(timeout.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::RelayError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

/// Top-level error of the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn authentication_maps_to_unauthorized() {
        let response = RelayError::Authentication.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = RelayError::from(StoreError::UnknownUser("u1".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn upstream_failures_map_to_service_unavailable_with_report() {
        let error = RelayError::from(UpstreamError::unavailable("status 502"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert!(report.messages[0].contains("status 502"));
    }

    #[test]
    fn timeout_is_unavailable() {
        let error = RelayError::from(UpstreamError::Timeout(Duration::from_secs(10)));
        assert!(matches!(error, RelayError::Unavailable { .. }));
        assert!(!error.is_authentication());
    }
}
