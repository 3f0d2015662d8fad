use std::path::PathBuf;

use anyhow::{Context, Result};

/// Runtime settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| "sonar.db".into());
        let database_path = database_url
            .strip_prefix("sqlite://")
            .unwrap_or(&database_url)
            .into();

        let host = lookup("SONAR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("SONAR_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("SONAR_PORT must be a port number, got '{}'", raw))?,
            None => 8000,
        };

        Ok(Self {
            database_path,
            host,
            port,
        })
    }
}
