use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use crate::{constants::DEFAULT_PAGE_SIZE, error::Error};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub media_root: PathBuf,
    pub media_url: String,
    pub page_size: i64,
}

impl Config {
    /// Reads the configuration from the environment, loading `.env` first when present.
    pub fn load() -> Result<Self, Error> {
        if let Err(e) = dotenvy::dotenv() {
            log::trace!("No .env file loaded: {e}");
        }

        Ok(Self {
            database_url: try_load("DATABASE_URL", "sqlite://foodgram.db")?,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            session_secret: require("SESSION_SECRET")?,
            session_ttl_hours: try_load("SESSION_TTL_HOURS", "24")?,
            media_root: try_load("MEDIA_ROOT", "media")?,
            media_url: try_load("MEDIA_URL", "/media")?,
            page_size: try_load("PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string())?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, Error>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            log::warn!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {key} value: {e}")))
}

fn require(key: &str) -> Result<String, Error> {
    var(key).ok_or_else(|| Error::Config(format!("Environment variable {key} is required")))
}
