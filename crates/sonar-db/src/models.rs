/// Database row types — these map directly to SQLite rows.
/// Distinct from sonar-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    /// PHC string; opaque to this crate.
    pub password: String,
    pub real_name: String,
    pub blurb: String,
}

pub struct PingRow {
    pub id: i64,
    pub user_id: i64,
    /// Joined from `users`, not stored on the ping.
    pub username: String,
    /// SQLite `datetime('now')` text, UTC, "YYYY-MM-DD HH:MM:SS".
    pub timestamp: String,
    pub content: String,
    pub likes: i64,
    pub echoes: i64,
}

pub struct TokenRow {
    pub id: i64,
    pub user_id: i64,
    pub timestamp: String,
    pub key: String,
}

/// Counter columns on `pings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingCounter {
    Likes,
    Echoes,
}

impl PingCounter {
    pub fn column(self) -> &'static str {
        match self {
            Self::Likes => "likes",
            Self::Echoes => "echoes",
        }
    }
}
