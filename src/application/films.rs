//! Film, rating, member and list lookups, read through the cache.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};
use url::Url;

use crate::application::error::RelayError;
use crate::application::upstream::{CatalogUpstream, FilmSearch, FilmSummary, ListEntry};
use crate::auth::AuthenticatedClient;
use crate::cache::CacheFabric;
use crate::cache::keys::{film_key, list_key, member_key, poster_key, rating_key};
use crate::domain::films::{
    FilmCriteria, FilmRating, ListLocator, ListSummary, ResolvedFilm, slugify_list_name,
};

const FILM_SEARCH_PAGE_SIZE: u32 = 10;
const LIST_PAGE_SIZE: u32 = 100;
const MAX_LIST_PAGES: usize = 5;
const LIST_HOSTS: [&str; 2] = ["letterboxd.com", "www.letterboxd.com"];

pub struct FilmService {
    upstream: Arc<dyn CatalogUpstream>,
    fabric: Arc<CacheFabric>,
}

impl FilmService {
    pub fn new(upstream: Arc<dyn CatalogUpstream>, fabric: Arc<CacheFabric>) -> Self {
        Self { upstream, fabric }
    }

    /// Resolve player-supplied criteria to an upstream film.
    ///
    /// Searches by title and prefers, in increasing order of precedence, the
    /// first result, a release-year match, an IMDb match and a TMDB match.
    /// Films that cannot be resolved are not cached.
    pub async fn resolve_film(
        &self,
        client: &AuthenticatedClient,
        criteria: &FilmCriteria,
    ) -> Result<Option<ResolvedFilm>, RelayError> {
        if criteria.is_empty() {
            return Ok(None);
        }
        let key = film_key(criteria);
        if let Some(film) = self.fabric.films().get(&key) {
            return Ok(Some(film));
        }

        let Some(title) = criteria.title.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };

        let search = FilmSearch {
            title: title.to_string(),
            year: criteria.year,
            per_page: FILM_SEARCH_PAGE_SIZE,
        };
        let upstream = &self.upstream;
        let search = &search;
        let results = client
            .call(|token| async move { upstream.search_films(&token, search).await })
            .await?;

        let Some(best) = pick_film(&results, criteria) else {
            debug!(target = "catalog_relay::films", title, "film not found");
            return Ok(None);
        };

        let resolved = ResolvedFilm {
            id: best.id.clone(),
            name: best.name.clone(),
            release_year: best.release_year,
            poster: best.best_poster().map(str::to_string),
            imdb_id: best.external_id("imdb").map(str::to_string),
            tmdb_id: best.external_id("tmdb").map(str::to_string),
        };
        self.fabric.films().set(key, resolved.clone());
        debug!(
            target = "catalog_relay::films",
            film_id = %resolved.id,
            name = %resolved.name,
            "film resolved"
        );
        Ok(Some(resolved))
    }

    /// The caller's relationship with a film plus community statistics.
    pub async fn film_rating(
        &self,
        client: &AuthenticatedClient,
        film_id: &str,
    ) -> Result<FilmRating, RelayError> {
        let key = rating_key(client.user_id().unwrap_or("app"), film_id);
        if let Some(rating) = self.fabric.ratings().get(&key) {
            return Ok(rating);
        }

        let upstream = &self.upstream;
        let (relationship, statistics) = tokio::try_join!(
            client.call(|token| async move { upstream.film_relationship(&token, film_id).await }),
            client.call(|token| async move { upstream.film_statistics(&token, film_id).await }),
        )?;

        let rating = FilmRating {
            film_id: film_id.to_string(),
            user_rating: relationship.rating,
            watched: relationship.watched,
            liked: relationship.liked,
            in_watchlist: relationship.in_watchlist,
            community_rating: statistics.rating,
            community_ratings: statistics.ratings_count,
        };
        self.fabric.ratings().set(key, rating.clone());
        Ok(rating)
    }

    /// Internal member id for a username.
    pub async fn resolve_member_id(
        &self,
        client: &AuthenticatedClient,
        username: &str,
    ) -> Result<Option<String>, RelayError> {
        let key = member_key(username);
        if let Some(id) = self.fabric.member_ids().get(&key) {
            return Ok(Some(id));
        }

        let upstream = &self.upstream;
        let member = client
            .call(|token| async move { upstream.search_member(&token, username).await })
            .await?;
        Ok(member.map(|member| {
            self.fabric.member_ids().set(key, member.id.clone());
            member.id
        }))
    }

    /// Metadata of another member's list, matched by URL slug.
    pub async fn resolve_external_list(
        &self,
        client: &AuthenticatedClient,
        locator: &ListLocator,
    ) -> Result<Option<ListSummary>, RelayError> {
        let key = list_key(&locator.username, &locator.slug);
        if let Some(list) = self.fabric.lists().get(&key) {
            return Ok(Some(list));
        }

        info!(
            target = "catalog_relay::films",
            username = %locator.username,
            slug = %locator.slug,
            "resolving external list"
        );

        let upstream = &self.upstream;
        let username = locator.username.as_str();
        let Some(member) = client
            .call(|token| async move { upstream.search_member(&token, username).await })
            .await?
        else {
            warn!(target = "catalog_relay::films", username, "member not found");
            return Ok(None);
        };
        self.fabric
            .member_ids()
            .set(member_key(username), member.id.clone());

        let mut lists: Vec<ListEntry> = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let member_id = member.id.as_str();
            let page_cursor = cursor.as_deref();
            let page = client
                .call(|token| async move {
                    upstream
                        .member_lists(&token, member_id, LIST_PAGE_SIZE, page_cursor)
                        .await
                })
                .await?;
            lists.extend(page.items);
            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        let Some(list) = lists
            .into_iter()
            .find(|list| slugify_list_name(&list.name) == locator.slug)
        else {
            warn!(
                target = "catalog_relay::films",
                username,
                slug = %locator.slug,
                "list not found by slug"
            );
            return Ok(None);
        };

        let summary = ListSummary {
            id: list.id,
            name: list.name,
            owner: member.display_name.unwrap_or(member.username),
            film_count: list.film_count,
        };
        self.fabric.lists().set(key, summary.clone());
        Ok(Some(summary))
    }

    /// Poster image bytes, fetched once per URL.
    pub async fn poster(&self, url: &str) -> Result<Bytes, RelayError> {
        let key = poster_key(url);
        if let Some(bytes) = self.fabric.posters().get(&key) {
            return Ok(bytes);
        }
        let bytes = self.upstream.fetch_poster(url).await?;
        self.fabric.posters().set(key, bytes.clone());
        Ok(bytes)
    }
}

fn pick_film<'a>(results: &'a [FilmSummary], criteria: &FilmCriteria) -> Option<&'a FilmSummary> {
    let mut best = results.first()?;
    if let Some(year) = criteria.year {
        if let Some(film) = results.iter().find(|f| f.release_year == Some(year)) {
            best = film;
        }
    }
    if let Some(imdb) = criteria.imdb_id.as_deref() {
        if let Some(film) = results.iter().find(|f| f.external_id("imdb") == Some(imdb)) {
            best = film;
        }
    }
    if let Some(tmdb) = criteria.tmdb_id.as_deref() {
        if let Some(film) = results.iter().find(|f| f.external_id("tmdb") == Some(tmdb)) {
            best = film;
        }
    }
    Some(best)
}

/// Owner and slug of a list URL such as
/// `https://letterboxd.com/someone/list/best-of-2023/`.
///
/// The scheme may be omitted. Returns `None` for anything else.
pub fn parse_list_url(input: &str) -> Option<ListLocator> {
    let trimmed = input.trim();
    let url = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{trimmed}")))
        .ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if !LIST_HOSTS.contains(&url.host_str()?) {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|segment| !segment.is_empty());
    let username = segments.next()?;
    if segments.next()? != "list" {
        return None;
    }
    let slug = segments.next()?;
    Some(ListLocator {
        username: username.to_string(),
        slug: slug.to_string(),
    })
}
