//! Port to the upstream catalog API.
//!
//! Types here are wire-neutral; the HTTP adapter in `infra::upstream` maps the
//! upstream JSON onto them.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failure of a single upstream call.
///
/// `Rejected` is the only variant the credential retry path reacts to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream rejected the credential")]
    Rejected,
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable(detail.into())
    }
}

/// Tokens returned by an OAuth token exchange.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present when the upstream rotates the refresh token.
    pub refresh_token: Option<String>,
    pub expires_in: Duration,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilmSearch {
    pub title: String,
    pub year: Option<u16>,
    pub per_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosterSize {
    pub width: u32,
    pub height: u32,
    pub url: String,
}

/// Link from an upstream film to an external database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLink {
    /// `imdb`, `tmdb`, ...
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilmSummary {
    pub id: String,
    pub name: String,
    pub release_year: Option<u16>,
    pub poster_sizes: Vec<PosterSize>,
    pub links: Vec<ExternalLink>,
}

impl FilmSummary {
    pub fn external_id(&self, kind: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.kind == kind)
            .map(|link| link.id.as_str())
    }

    /// URL of the widest poster rendition.
    pub fn best_poster(&self) -> Option<&str> {
        self.poster_sizes
            .iter()
            .max_by_key(|size| size.width)
            .map(|size| size.url.as_str())
    }
}

/// The calling member's relationship with a film.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilmRelationship {
    pub rating: Option<f32>,
    pub watched: bool,
    pub liked: bool,
    pub in_watchlist: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilmStatistics {
    pub rating: Option<f32>,
    pub ratings_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSummary {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub id: String,
    pub name: String,
    pub film_count: u32,
}

/// One cursor page of a member's lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPage {
    pub items: Vec<ListEntry>,
    pub cursor: Option<String>,
}

#[async_trait]
pub trait CatalogUpstream: Send + Sync {
    /// Client-credentials grant for the application itself.
    async fn exchange_app_credentials(&self) -> Result<TokenGrant, UpstreamError>;

    /// Refresh-token grant on behalf of one user.
    async fn refresh_delegated_credential(
        &self,
        refresh_token: &str,
    ) -> Result<TokenGrant, UpstreamError>;

    async fn search_films(
        &self,
        token: &str,
        search: &FilmSearch,
    ) -> Result<Vec<FilmSummary>, UpstreamError>;

    async fn film_relationship(
        &self,
        token: &str,
        film_id: &str,
    ) -> Result<FilmRelationship, UpstreamError>;

    async fn film_statistics(
        &self,
        token: &str,
        film_id: &str,
    ) -> Result<FilmStatistics, UpstreamError>;

    /// Exact-username member lookup.
    async fn search_member(
        &self,
        token: &str,
        username: &str,
    ) -> Result<Option<MemberSummary>, UpstreamError>;

    /// Lists owned by `member_id`, one cursor page at a time.
    async fn member_lists(
        &self,
        token: &str,
        member_id: &str,
        per_page: u32,
        cursor: Option<&str>,
    ) -> Result<ListPage, UpstreamError>;

    async fn fetch_poster(&self, url: &str) -> Result<Bytes, UpstreamError>;
}
