#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use catalog_relay::application::upstream::{
    CatalogUpstream, ExternalLink, FilmRelationship, FilmSearch, FilmStatistics, FilmSummary,
    ListPage, MemberSummary, TokenGrant, UpstreamError,
};
use catalog_relay::auth::AuthSettings;
use catalog_relay::cache::CacheConfig;
use catalog_relay::clock::ManualClock;
use catalog_relay::context::RelayContext;
use catalog_relay::infra::credentials::MemoryCredentialStore;

/// Scriptable upstream that counts every call.
#[derive(Default)]
pub struct FakeUpstream {
    pub app_exchanges: AtomicUsize,
    pub delegated_refreshes: AtomicUsize,
    pub film_searches: AtomicUsize,
    pub relationship_calls: AtomicUsize,
    pub statistics_calls: AtomicUsize,
    pub member_searches: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub poster_fetches: AtomicUsize,
    /// Data calls made, whatever their outcome.
    pub data_calls: AtomicUsize,

    token_lifetime: Mutex<Option<Duration>>,
    exchange_delay: Mutex<Duration>,
    call_delay: Mutex<Duration>,
    reject_next: AtomicUsize,
    rejected_tokens: Mutex<HashSet<String>>,
    refresh_rejected: Mutex<bool>,
    exchange_failure: Mutex<Option<UpstreamError>>,
    presented_refresh_tokens: Mutex<Vec<String>>,
    presented_tokens: Mutex<Vec<String>>,
    films: Mutex<Vec<FilmSummary>>,
    member: Mutex<Option<MemberSummary>>,
    list_pages: Mutex<Vec<ListPage>>,
}

impl FakeUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_token_lifetime(&self, lifetime: Duration) {
        *self.token_lifetime.lock().expect("lock") = Some(lifetime);
    }

    pub fn set_exchange_delay(&self, delay: Duration) {
        *self.exchange_delay.lock().expect("lock") = delay;
    }

    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock().expect("lock") = delay;
    }

    /// Reject the next `count` data calls regardless of token.
    pub fn reject_next(&self, count: usize) {
        self.reject_next.store(count, Ordering::SeqCst);
    }

    /// Reject every data call presenting `token`.
    pub fn reject_token(&self, token: &str) {
        self.rejected_tokens
            .lock()
            .expect("lock")
            .insert(token.to_string());
    }

    pub fn reject_refreshes(&self) {
        *self.refresh_rejected.lock().expect("lock") = true;
    }

    pub fn fail_exchanges(&self, error: Option<UpstreamError>) {
        *self.exchange_failure.lock().expect("lock") = error;
    }

    pub fn set_films(&self, films: Vec<FilmSummary>) {
        *self.films.lock().expect("lock") = films;
    }

    pub fn set_member(&self, member: MemberSummary) {
        *self.member.lock().expect("lock") = Some(member);
    }

    pub fn set_list_pages(&self, pages: Vec<ListPage>) {
        *self.list_pages.lock().expect("lock") = pages;
    }

    pub fn presented_refresh_tokens(&self) -> Vec<String> {
        self.presented_refresh_tokens.lock().expect("lock").clone()
    }

    pub fn presented_tokens(&self) -> Vec<String> {
        self.presented_tokens.lock().expect("lock").clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn lifetime(&self) -> Duration {
        self.token_lifetime
            .lock()
            .expect("lock")
            .unwrap_or(Duration::from_secs(3600))
    }

    async fn data_call(&self, counter: &AtomicUsize, token: &str) -> Result<(), UpstreamError> {
        counter.fetch_add(1, Ordering::SeqCst);
        self.data_calls.fetch_add(1, Ordering::SeqCst);
        self.presented_tokens
            .lock()
            .expect("lock")
            .push(token.to_string());

        let delay = *self.call_delay.lock().expect("lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .reject_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let listed = self.rejected_tokens.lock().expect("lock").contains(token);
        if scripted || listed {
            return Err(UpstreamError::Rejected);
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogUpstream for FakeUpstream {
    async fn exchange_app_credentials(&self) -> Result<TokenGrant, UpstreamError> {
        let n = self.app_exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.exchange_delay.lock().expect("lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.exchange_failure.lock().expect("lock").clone() {
            return Err(error);
        }
        Ok(TokenGrant {
            access_token: format!("app-token-{n}"),
            refresh_token: None,
            expires_in: self.lifetime(),
        })
    }

    async fn refresh_delegated_credential(
        &self,
        refresh_token: &str,
    ) -> Result<TokenGrant, UpstreamError> {
        let n = self.delegated_refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        self.presented_refresh_tokens
            .lock()
            .expect("lock")
            .push(refresh_token.to_string());
        let delay = *self.exchange_delay.lock().expect("lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.refresh_rejected.lock().expect("lock") {
            return Err(UpstreamError::Rejected);
        }
        Ok(TokenGrant {
            access_token: format!("user-token-{n}"),
            refresh_token: Some(format!("refresh-{n}")),
            expires_in: self.lifetime(),
        })
    }

    async fn search_films(
        &self,
        token: &str,
        search: &FilmSearch,
    ) -> Result<Vec<FilmSummary>, UpstreamError> {
        self.data_call(&self.film_searches, token).await?;
        let films = self.films.lock().expect("lock").clone();
        Ok(films
            .into_iter()
            .filter(|film| film.name.eq_ignore_ascii_case(&search.title))
            .collect())
    }

    async fn film_relationship(
        &self,
        token: &str,
        _film_id: &str,
    ) -> Result<FilmRelationship, UpstreamError> {
        self.data_call(&self.relationship_calls, token).await?;
        Ok(FilmRelationship {
            rating: Some(4.5),
            watched: true,
            liked: true,
            in_watchlist: false,
        })
    }

    async fn film_statistics(
        &self,
        token: &str,
        _film_id: &str,
    ) -> Result<FilmStatistics, UpstreamError> {
        self.data_call(&self.statistics_calls, token).await?;
        Ok(FilmStatistics {
            rating: Some(3.9),
            ratings_count: 120_000,
        })
    }

    async fn search_member(
        &self,
        token: &str,
        username: &str,
    ) -> Result<Option<MemberSummary>, UpstreamError> {
        self.data_call(&self.member_searches, token).await?;
        Ok(self
            .member
            .lock()
            .expect("lock")
            .clone()
            .filter(|member| member.username.eq_ignore_ascii_case(username)))
    }

    async fn member_lists(
        &self,
        token: &str,
        _member_id: &str,
        _per_page: u32,
        cursor: Option<&str>,
    ) -> Result<ListPage, UpstreamError> {
        self.data_call(&self.list_calls, token).await?;
        let index = cursor
            .and_then(|cursor| cursor.parse::<usize>().ok())
            .unwrap_or(0);
        Ok(self
            .list_pages
            .lock()
            .expect("lock")
            .get(index)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_poster(&self, url: &str) -> Result<Bytes, UpstreamError> {
        self.poster_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(format!("image:{url}")))
    }
}

pub fn film(id: &str, name: &str, year: u16, imdb: &str) -> FilmSummary {
    FilmSummary {
        id: id.to_string(),
        name: name.to_string(),
        release_year: Some(year),
        poster_sizes: Vec::new(),
        links: vec![ExternalLink {
            kind: "imdb".to_string(),
            id: imdb.to_string(),
        }],
    }
}

pub struct Harness {
    pub upstream: Arc<FakeUpstream>,
    pub store: Arc<MemoryCredentialStore>,
    pub clock: Arc<ManualClock>,
    pub relay: Arc<RelayContext>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(AuthSettings::default())
    }

    pub fn with_settings(settings: AuthSettings) -> Self {
        Self::build(CacheConfig::default(), settings)
    }

    pub fn build(cache: CacheConfig, settings: AuthSettings) -> Self {
        let upstream = FakeUpstream::new();
        let store = Arc::new(MemoryCredentialStore::new());
        let clock = ManualClock::shared();
        let relay = Arc::new(RelayContext::new(
            cache,
            settings,
            upstream.clone(),
            store.clone(),
            clock.clone(),
        ));
        Self {
            upstream,
            store,
            clock,
            relay,
        }
    }
}
