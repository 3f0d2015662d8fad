//! Rules the schema leaves to the application.
//!
//! The `pings.content` column accepts text of any length; the 140 character
//! cap lives here and is checked before anything reaches the database.

use thiserror::Error;

/// Longest ping accepted, counted in Unicode scalar values.
pub const MAX_PING_CHARS: usize = 140;

/// Shortest password accepted, in bytes.
pub const MIN_PASSWORD_LEN: usize = 16;

pub const MAX_USERNAME_CHARS: usize = 32;

/// Path segments under `/v1/users/` that name something other than a user.
pub const RESERVED_USERNAMES: &[&str] = &["me"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Ping content is empty")]
    EmptyPing,

    #[error("Ping content exceeds {} characters", MAX_PING_CHARS)]
    PingTooLong { chars: usize },

    #[error("Password too short")]
    PasswordTooShort,

    #[error("Username must be 1 to {} characters of letters, digits or '_'", MAX_USERNAME_CHARS)]
    InvalidUsername,

    #[error("Username '{0}' is reserved")]
    ReservedUsername(String),
}

pub fn validate_ping_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyPing);
    }
    let chars = content.chars().count();
    if chars > MAX_PING_CHARS {
        return Err(ValidationError::PingTooLong { chars });
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    let well_formed = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if len == 0 || len > MAX_USERNAME_CHARS || !well_formed {
        return Err(ValidationError::InvalidUsername);
    }
    if RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(username))
    {
        return Err(ValidationError::ReservedUsername(username.to_string()));
    }
    Ok(())
}
