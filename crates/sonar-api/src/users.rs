use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use sonar_crypto::password::hash_password;
use sonar_db::models::UserRow;
use sonar_types::api::{CreateUserRequest, UpdateProfileRequest, UserResponse};
use sonar_types::validation::{validate_password, validate_username};

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam};
use crate::guard::AuthUser;
use crate::{AppState, db_call};

const USERNAME_TAKEN: &str = "Username already in use; pick another";

pub fn user_response(row: UserRow) -> UserResponse {
    UserResponse {
        id: row.id,
        username: row.username,
        real_name: row.real_name,
        blurb: row.blurb,
    }
}

/// POST /v1/users — sign up. No token needed; this is where accounts come from.
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)?;

    let username = req.username.clone();
    if db_call(&state, move |db| db.username_exists(&username)).await? {
        return Err(ApiError::BadRequest(USERNAME_TAKEN.into()));
    }

    validate_password(&req.password)?;

    // Argon2 runs on the blocking pool together with the insert.
    let created = db_call(&state, move |db| {
        let password_hash = hash_password(&req.password)?;
        db.create_user(
            &req.username,
            &password_hash,
            req.real_name.as_deref().unwrap_or_default(),
            req.blurb.as_deref().unwrap_or_default(),
        )
    })
    .await?;

    // Lost a race with a concurrent signup for the same name.
    let user = created.ok_or_else(|| ApiError::BadRequest(USERNAME_TAKEN.into()))?;

    info!("Created user {} ({})", user.username, user.id);
    Ok((StatusCode::CREATED, Json(user_response(user))))
}

/// GET /v1/users/{username}
pub async fn get_user(
    State(state): State<AppState>,
    PathParam(username): PathParam<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = db_call(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(user_response(user)))
}

/// GET /v1/users/me
pub async fn get_me(auth: AuthUser) -> Json<UserResponse> {
    Json(user_response(auth.user))
}

/// PUT /v1/users/me — edit `real_name` and/or `blurb`.
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = auth.user.id;
    let user = db_call(&state, move |db| {
        db.update_profile(user_id, req.real_name.as_deref(), req.blurb.as_deref())
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!("Updated profile of {}", user.username);
    Ok(Json(user_response(user)))
}
