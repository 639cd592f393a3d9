//! Internal operational endpoints.
//!
//! The player-facing routes live elsewhere; this router only exposes health,
//! cache visibility and the preference-change hook.

mod middleware;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Serialize;
use tracing::info;

use crate::context::RelayContext;

pub use middleware::log_responses;

#[derive(Clone)]
pub struct RouterState {
    pub relay: Arc<RelayContext>,
}

pub fn build_router(relay: Arc<RelayContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/internal/cache/stats", get(cache_stats))
        .route("/internal/cache/metrics", get(cache_metrics))
        .route("/internal/cache/purge", post(purge_expired))
        .route("/internal/cache", delete(clear_caches))
        .route(
            "/internal/users/{user_id}/preferences-changed",
            post(preferences_changed),
        )
        .route("/internal/users/{user_id}", delete(forget_user))
        .with_state(RouterState { relay })
        .layer(from_fn(log_responses))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn cache_stats(State(state): State<RouterState>) -> Response {
    Json(state.relay.cache_stats()).into_response()
}

async fn cache_metrics(State(state): State<RouterState>) -> Response {
    Json(state.relay.cache_metrics()).into_response()
}

async fn purge_expired(State(state): State<RouterState>) -> Response {
    Json(state.relay.purge_expired()).into_response()
}

async fn clear_caches(State(state): State<RouterState>) -> StatusCode {
    state.relay.clear_caches();
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
struct InvalidationResponse {
    removed: usize,
}

async fn preferences_changed(
    State(state): State<RouterState>,
    Path(user_id): Path<String>,
) -> Response {
    let removed = state.relay.preferences_changed(&user_id);
    info!(
        target = "catalog_relay::http::internal",
        user_id = %user_id,
        removed,
        "user catalogs invalidated"
    );
    Json(InvalidationResponse { removed }).into_response()
}

async fn forget_user(State(state): State<RouterState>, Path(user_id): Path<String>) -> StatusCode {
    state.relay.forget_user(&user_id);
    StatusCode::NO_CONTENT
}
