//! `reqwest` adapter for the upstream catalog API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, Response, StatusCode, Url, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::form_urlencoded;

use crate::application::upstream::{
    CatalogUpstream, ExternalLink, FilmRelationship, FilmSearch, FilmStatistics, FilmSummary,
    ListEntry, ListPage, MemberSummary, PosterSize, TokenGrant, UpstreamError,
};
use crate::config::UpstreamSettings;

use super::error::InfraError;

const MEMBER_SEARCH_PAGE_SIZE: u32 = 20;

pub struct HttpUpstream {
    client: Client,
    base: Url,
    client_id: String,
    client_secret: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            base: settings.base_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            timeout: settings.timeout,
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, UpstreamError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| UpstreamError::unavailable(format!("invalid path `{path}`: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<TokenGrant, UpstreamError> {
        // The serializer is not `Send`; finish it before the first await.
        let body = {
            let mut form = form_urlencoded::Serializer::new(String::new());
            form.extend_pairs(grant);
            form.append_pair("client_id", &self.client_id);
            form.append_pair("client_secret", &self.client_secret);
            form.finish()
        };

        let response = self
            .client
            .post(self.url("auth/token", &[])?)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let body = response.bytes().await.unwrap_or_default();
            let rejected = serde_json::from_slice::<WireTokenError>(&body)
                .is_ok_and(|error| error.error == "invalid_grant");
            return Err(if rejected {
                UpstreamError::Rejected
            } else {
                UpstreamError::unavailable(format!("status {status}"))
            });
        }

        let token: WireToken = self.decode(response).await?;
        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: Duration::from_secs(token.expires_in),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let url = self.url(path, query)?;
        debug!(target = "catalog_relay::upstream", path, "upstream request");
        let response = self
            .client
            .request(Method::GET, url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        self.decode(response).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, UpstreamError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(UpstreamError::Rejected);
        }
        if !status.is_success() {
            // Upstream bodies can echo tokens; keep only the status.
            return Err(UpstreamError::unavailable(format!("status {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| UpstreamError::unavailable(format!("failed to parse body: {err}")))
    }

    fn transport_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::unavailable(err.without_url().to_string())
        }
    }
}

#[async_trait]
impl CatalogUpstream for HttpUpstream {
    async fn exchange_app_credentials(&self) -> Result<TokenGrant, UpstreamError> {
        self.token_request(&[("grant_type", "client_credentials")]).await
    }

    async fn refresh_delegated_credential(
        &self,
        refresh_token: &str,
    ) -> Result<TokenGrant, UpstreamError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn search_films(
        &self,
        token: &str,
        search: &FilmSearch,
    ) -> Result<Vec<FilmSummary>, UpstreamError> {
        let per_page = search.per_page.to_string();
        let year = search.year.map(|year| year.to_string());
        let mut query = vec![
            ("input", search.title.as_str()),
            ("include", "FilmSearchItem"),
            ("perPage", per_page.as_str()),
        ];
        if let Some(year) = year.as_deref() {
            query.push(("year", year));
        }

        let page: WireSearchPage<WireFilmItem> = self.get_json(token, "search", &query).await?;
        Ok(page
            .items
            .into_iter()
            .filter_map(|item| item.film)
            .map(FilmSummary::from)
            .collect())
    }

    async fn film_relationship(
        &self,
        token: &str,
        film_id: &str,
    ) -> Result<FilmRelationship, UpstreamError> {
        let wire: WireRelationship = self
            .get_json(token, &format!("film/{film_id}/me"), &[])
            .await?;
        Ok(FilmRelationship {
            rating: wire.rating,
            watched: wire.watched,
            liked: wire.liked,
            in_watchlist: wire.in_watchlist,
        })
    }

    async fn film_statistics(
        &self,
        token: &str,
        film_id: &str,
    ) -> Result<FilmStatistics, UpstreamError> {
        let wire: WireStatistics = self
            .get_json(token, &format!("film/{film_id}/statistics"), &[])
            .await?;
        Ok(FilmStatistics {
            rating: wire.rating,
            ratings_count: wire.counts.ratings,
        })
    }

    async fn search_member(
        &self,
        token: &str,
        username: &str,
    ) -> Result<Option<MemberSummary>, UpstreamError> {
        let per_page = MEMBER_SEARCH_PAGE_SIZE.to_string();
        let query = [
            ("input", username),
            ("include", "MemberSearchItem"),
            ("perPage", per_page.as_str()),
        ];
        let page: WireSearchPage<WireMemberItem> = self.get_json(token, "search", &query).await?;
        Ok(page
            .items
            .into_iter()
            .filter_map(|item| item.member)
            .find(|member| member.username.eq_ignore_ascii_case(username))
            .map(|member| MemberSummary {
                id: member.id,
                username: member.username,
                display_name: member.display_name,
            }))
    }

    async fn member_lists(
        &self,
        token: &str,
        member_id: &str,
        per_page: u32,
        cursor: Option<&str>,
    ) -> Result<ListPage, UpstreamError> {
        let per_page = per_page.to_string();
        let mut query = vec![
            ("member", member_id),
            ("memberRelationship", "Owner"),
            ("perPage", per_page.as_str()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let wire: WireListPage = self.get_json(token, "lists", &query).await?;
        Ok(ListPage {
            items: wire
                .items
                .into_iter()
                .map(|list| ListEntry {
                    id: list.id,
                    name: list.name,
                    film_count: list.film_count,
                })
                .collect(),
            cursor: wire.next,
        })
    }

    async fn fetch_poster(&self, url: &str) -> Result<Bytes, UpstreamError> {
        let url = Url::parse(url)
            .map_err(|err| UpstreamError::unavailable(format!("invalid poster url: {err}")))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::unavailable(format!("status {status}")));
        }
        response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))
    }
}

#[derive(Deserialize)]
struct WireToken {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: u64,
}

#[derive(Deserialize)]
struct WireTokenError {
    error: String,
}

#[derive(Deserialize)]
struct WireSearchPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct WireFilmItem {
    film: Option<WireFilm>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFilm {
    id: String,
    name: String,
    release_year: Option<u16>,
    poster: Option<WireImage>,
    #[serde(default)]
    links: Vec<WireLink>,
}

#[derive(Deserialize)]
struct WireImage {
    #[serde(default)]
    sizes: Vec<WireImageSize>,
}

#[derive(Deserialize)]
struct WireImageSize {
    width: u32,
    height: u32,
    url: String,
}

#[derive(Deserialize)]
struct WireLink {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

impl From<WireFilm> for FilmSummary {
    fn from(film: WireFilm) -> Self {
        Self {
            id: film.id,
            name: film.name,
            release_year: film.release_year,
            poster_sizes: film
                .poster
                .map(|poster| poster.sizes)
                .unwrap_or_default()
                .into_iter()
                .map(|size| PosterSize {
                    width: size.width,
                    height: size.height,
                    url: size.url,
                })
                .collect(),
            links: film
                .links
                .into_iter()
                .map(|link| ExternalLink {
                    kind: link.kind,
                    id: link.id,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRelationship {
    rating: Option<f32>,
    #[serde(default)]
    watched: bool,
    #[serde(default)]
    liked: bool,
    #[serde(default)]
    in_watchlist: bool,
}

#[derive(Deserialize)]
struct WireStatistics {
    rating: Option<f32>,
    counts: WireStatisticsCounts,
}

#[derive(Deserialize)]
struct WireStatisticsCounts {
    #[serde(default)]
    ratings: u64,
}

#[derive(Deserialize)]
struct WireMemberItem {
    member: Option<WireMember>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMember {
    id: String,
    username: String,
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct WireListPage {
    #[serde(default)]
    items: Vec<WireList>,
    next: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireList {
    id: String,
    name: String,
    #[serde(default)]
    film_count: u32,
}
