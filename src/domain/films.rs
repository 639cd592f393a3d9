//! Film, rating and list records served from the cache.

use serde::{Deserialize, Serialize};

/// Criteria a player sends to identify a film.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmCriteria {
    pub title: Option<String>,
    pub year: Option<u16>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
}

impl FilmCriteria {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.imdb_id.is_none() && self.tmdb_id.is_none()
    }
}

/// A film resolved against the upstream catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFilm {
    pub id: String,
    pub name: String,
    pub release_year: Option<u16>,
    pub poster: Option<String>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
}

/// A user's relationship with a film plus community statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmRating {
    pub film_id: String,
    pub user_rating: Option<f32>,
    pub watched: bool,
    pub liked: bool,
    pub in_watchlist: bool,
    pub community_rating: Option<f32>,
    pub community_ratings: u64,
}

/// Metadata of a list resolved from a list URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub film_count: u32,
}

/// Owner and slug parsed out of a list URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListLocator {
    pub username: String,
    pub slug: String,
}

/// Lowercase, dash-separated form of a list name as it appears in URLs.
pub fn slugify_list_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify_list_name("Best of 2023!"), "best-of-2023");
        assert_eq!(slugify_list_name("  -- Noir & Neo-Noir --  "), "noir-neo-noir");
        assert_eq!(slugify_list_name("Éclairs"), "clairs");
    }

    #[test]
    fn criteria_without_identifiers_is_empty() {
        let criteria = FilmCriteria {
            year: Some(1999),
            ..Default::default()
        };
        assert!(criteria.is_empty());
    }
}
