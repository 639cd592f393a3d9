//! Cache domain identifiers and key builders.
//!
//! Every domain owns its own store, so keys only need to be unique within a
//! domain. The prefixes keep log lines and index entries readable.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::domain::films::FilmCriteria;

/// The fixed roster of cache domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDomain {
    /// Film search criteria resolved to an upstream film.
    Films,
    /// Per-user rating/relationship data for a film.
    Ratings,
    /// Username to internal member id.
    MemberIds,
    /// Metadata of lists resolved from list URLs.
    Lists,
    /// Shared catalogs served to every user (popular, top rated).
    CatalogPages,
    /// Poster image bytes.
    Posters,
    /// Delegated per-user access credentials.
    DelegatedCredentials,
    /// Full per-user catalogs, sliced into pages on read.
    UserCatalogs,
}

impl CacheDomain {
    pub const ALL: [CacheDomain; 8] = [
        CacheDomain::Films,
        CacheDomain::Ratings,
        CacheDomain::MemberIds,
        CacheDomain::Lists,
        CacheDomain::CatalogPages,
        CacheDomain::Posters,
        CacheDomain::DelegatedCredentials,
        CacheDomain::UserCatalogs,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            CacheDomain::Films => "films",
            CacheDomain::Ratings => "ratings",
            CacheDomain::MemberIds => "member_ids",
            CacheDomain::Lists => "lists",
            CacheDomain::CatalogPages => "catalog_pages",
            CacheDomain::Posters => "posters",
            CacheDomain::DelegatedCredentials => "delegated_credentials",
            CacheDomain::UserCatalogs => "user_catalogs",
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Key builders
// ============================================================================

/// Film lookup key. Titles are case-folded so "Alien" and "alien" share an entry.
pub fn film_key(criteria: &FilmCriteria) -> String {
    format!(
        "film:t={}|y={}|imdb={}|tmdb={}",
        criteria
            .title
            .as_deref()
            .map(|title| title.trim().to_lowercase())
            .unwrap_or_default(),
        criteria.year.map(|y| y.to_string()).unwrap_or_default(),
        criteria.imdb_id.as_deref().unwrap_or_default(),
        criteria.tmdb_id.as_deref().unwrap_or_default(),
    )
}

pub fn rating_key(user_id: &str, film_id: &str) -> String {
    format!("rating:{user_id}:{film_id}")
}

pub fn member_key(username: &str) -> String {
    format!("member:{}", username.to_lowercase())
}

pub fn list_key(username: &str, slug: &str) -> String {
    format!("list:{}:{slug}", username.to_lowercase())
}

pub fn poster_key(url: &str) -> String {
    format!("poster:{url}")
}

pub fn credential_key(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// Key for a user's full catalog. `variant` distinguishes shapes of the same
/// catalog (sort order, genre filter) and is hashed to keep keys short.
pub fn user_catalog_key(user_id: &str, catalog_id: &str, variant: &str) -> String {
    format!(
        "catalog:{user_id}:{catalog_id}:{:016x}",
        hash_value(&variant)
    )
}

pub fn shared_catalog_key(catalog_id: &str, variant: &str) -> String {
    format!("shared:{catalog_id}:{:016x}", hash_value(&variant))
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
