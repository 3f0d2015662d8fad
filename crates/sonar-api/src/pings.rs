use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use sonar_db::models::PingRow;
use sonar_types::api::{CreatePingRequest, PingResponse};
use sonar_types::validation::validate_ping_content;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::guard::AuthUser;
use crate::{AppState, db_call, parse_timestamp};

/// Upper bound on `limit`, whatever the client asks for.
const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct PingQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Id of the oldest ping from the previous page.
    pub before: Option<i64>,
}

fn default_limit() -> u32 {
    50
}

pub fn ping_response(row: PingRow) -> PingResponse {
    PingResponse {
        timestamp: parse_timestamp(&row.timestamp, &format!("ping {}", row.id)),
        id: row.id,
        user_id: row.user_id,
        username: row.username,
        content: row.content,
        likes: counter_value(row.likes),
        echoes: counter_value(row.echoes),
    }
}

/// Counters are stored as i64; clamp into the wire type rather than wrap.
fn counter_value(stored: i64) -> u32 {
    u32::try_from(stored.max(0)).unwrap_or(u32::MAX)
}

/// POST /v1/pings
pub async fn create_ping(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(req): JsonBody<CreatePingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_ping_content(&req.content)?;

    let user_id = auth.user.id;
    let ping = db_call(&state, move |db| db.insert_ping(user_id, &req.content)).await?;

    info!("{} posted ping {}", auth.user.username, ping.id);
    Ok((StatusCode::CREATED, Json(ping_response(ping))))
}

/// GET /v1/pings/{id}
pub async fn get_ping(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<PingResponse>, ApiError> {
    let ping = db_call(&state, move |db| db.get_ping(id))
        .await?
        .ok_or_else(ping_not_found)?;

    Ok(Json(ping_response(ping)))
}

/// GET /v1/users/{username}/pings — newest first, cursor-paginated via `before`.
pub async fn get_user_pings(
    State(state): State<AppState>,
    PathParam(username): PathParam<String>,
    QueryParams(query): QueryParams<PingQuery>,
) -> Result<Json<Vec<PingResponse>>, ApiError> {
    let limit = query.limit.min(MAX_PAGE_SIZE);
    let before = query.before;

    let rows = db_call(&state, move |db| {
        let Some(user) = db.get_user_by_username(&username)? else {
            return Ok(None);
        };
        db.get_pings_by_user(user.id, limit, before).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(rows.into_iter().map(ping_response).collect()))
}

/// POST /v1/pings/{id}/like
pub async fn like(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<PingResponse>, ApiError> {
    counter_response(db_call(&state, move |db| db.add_like(id)).await?)
}

/// DELETE /v1/pings/{id}/like
pub async fn unlike(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<PingResponse>, ApiError> {
    counter_response(db_call(&state, move |db| db.remove_like(id)).await?)
}

/// POST /v1/pings/{id}/echo
pub async fn echo(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<PingResponse>, ApiError> {
    counter_response(db_call(&state, move |db| db.add_echo(id)).await?)
}

/// DELETE /v1/pings/{id}/echo
pub async fn unecho(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<PingResponse>, ApiError> {
    counter_response(db_call(&state, move |db| db.remove_echo(id)).await?)
}

fn counter_response(ping: Option<PingRow>) -> Result<Json<PingResponse>, ApiError> {
    ping.map(|row| Json(ping_response(row))).ok_or_else(ping_not_found)
}

fn ping_not_found() -> ApiError {
    ApiError::NotFound("Ping not found".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_saturate_instead_of_wrapping() {
        assert_eq!(counter_value(0), 0);
        assert_eq!(counter_value(42), 42);
        assert_eq!(counter_value(u32::MAX as i64), u32::MAX);
        assert_eq!(counter_value(u32::MAX as i64 + 1), u32::MAX);
        assert_eq!(counter_value(i64::MAX), u32::MAX);
    }
}
