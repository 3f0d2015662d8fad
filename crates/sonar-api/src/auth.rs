use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use sonar_crypto::keys::generate_token_key;
use sonar_crypto::password::{verify_password, verify_password_unknown_user};
use sonar_types::api::{CreateTokenRequest, TokenResponse};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::guard::AuthUser;
use crate::{AppState, db_call, parse_timestamp};

/// POST /v1/tokens — trade a username and password for a token.
///
/// Each user holds at most one token, so logging in again rotates the key and
/// any previously issued key stops working.
pub async fn create_token(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = db_call(&state, move |db| {
        let Some(user) = db.get_user_by_username(&req.username)? else {
            verify_password_unknown_user(&req.password)?;
            return Ok(None);
        };
        if !verify_password(&req.password, &user.password)? {
            return Ok(None);
        }

        let token = db.upsert_token(user.id, &generate_token_key())?;
        Ok(Some((user, token)))
    })
    .await?;

    // Same answer for unknown user and wrong password.
    let (user, token) =
        issued.ok_or_else(|| ApiError::Unauthorized("Invalid username or password".into()))?;

    info!("Issued token for {} ({})", user.username, user.id);

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            user_id: user.id,
            issued_at: parse_timestamp(&token.timestamp, "auth token"),
            username: user.username,
            token: token.key,
        }),
    ))
}

/// DELETE /v1/tokens — log out by dropping the caller's token.
pub async fn revoke_token(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    let user_id = auth.user.id;
    db_call(&state, move |db| db.delete_token_for_user(user_id)).await?;

    info!("Revoked token for {}", auth.user.username);
    Ok(StatusCode::NO_CONTENT)
}
