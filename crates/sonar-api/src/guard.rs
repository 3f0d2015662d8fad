//! Request guard resolving `Authorization: Token <key>` to a user.
//!
//! Handlers that take an [`AuthUser`] argument are only reachable with a
//! valid token; the rest of the API is public. The rules:
//!
//! - the header must be present exactly once (401 otherwise),
//! - its value must start with `Token ` (401 otherwise),
//! - the key must match a stored token (403 otherwise).
//!
//! Tokens do not expire; a key is valid until it is rotated or revoked.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use sonar_db::models::UserRow;

use crate::error::ApiError;
use crate::{AppState, db_call};

pub const TOKEN_PREFIX: &str = "Token ";

/// The user who presented the request's token.
pub struct AuthUser {
    pub user: UserRow,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = token_key(&parts.headers)?.to_string();

        let user = db_call(state, move |db| db.get_user_by_token(&key))
            .await?
            .ok_or_else(|| ApiError::Forbidden("Token presented was not valid".into()))?;

        Ok(AuthUser { user })
    }
}

fn token_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    let mut values = headers.get_all(header::AUTHORIZATION).iter();
    let (Some(value), None) = (values.next(), values.next()) else {
        return Err(ApiError::Unauthorized(
            "`Authorization` header must appear exactly once".into(),
        ));
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("`Authorization` header is not valid text".into()))?;

    value.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
        ApiError::Unauthorized(format!(
            "`Authorization` header must begin with the string '{}'",
            TOKEN_PREFIX
        ))
    })
}
