use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub real_name: Option<String>,
    pub blurb: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub real_name: Option<String>,
    pub blurb: Option<String>,
}

/// Public view of a user. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub real_name: String,
    pub blurb: String,
}

// -- Tokens --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

// -- Pings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePingRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub likes: u32,
    pub echoes: u32,
}

// -- Errors --

/// Body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub reason: String,
}

impl ErrorResponse {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            reason: reason.into(),
        }
    }
}
