//! HTTP surface of sonar: users, tokens and pings under `/v1`.

pub mod auth;
pub mod error;
pub mod extract;
pub mod guard;
pub mod pings;
pub mod users;

use std::sync::Arc;

use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{error, warn};

use sonar_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
}

impl AppStateInner {
    pub fn new(db: Database) -> AppState {
        Arc::new(Self { db })
    }
}

/// Build the full `/v1` router. Unknown paths get the JSON 404 body.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1", get(index))
        .route("/v1/", get(index))
        .route("/v1/users", post(users::create_user))
        .route("/v1/users/me", get(users::get_me).put(users::update_me))
        .route("/v1/users/{username}", get(users::get_user))
        .route("/v1/users/{username}/pings", get(pings::get_user_pings))
        .route("/v1/tokens", post(auth::create_token).delete(auth::revoke_token))
        .route("/v1/pings", post(pings::create_ping))
        .route("/v1/pings/{id}", get(pings::get_ping))
        .route("/v1/pings/{id}/like", post(pings::like).delete(pings::unlike))
        .route("/v1/pings/{id}/echo", post(pings::echo).delete(pings::unecho))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sonar",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Resource was not found.".into())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Run blocking DB work (and anything else slow, like Argon2) off the async runtime.
pub(crate) async fn db_call<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
        .map_err(ApiError::Internal)
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone; they are UTC.
pub(crate) fn parse_timestamp(raw: &str, owner: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {}: {}", raw, owner, e);
            DateTime::default()
        })
}
