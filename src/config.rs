use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Context};
use log::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub secret_key: String,
    pub token_lifetime_hours: i64,
    pub media_root: PathBuf,
    pub media_url: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            bind_address: try_load("BIND_ADDRESS", "0.0.0.0:8000")?,
            database_url: require("DATABASE_URL")?,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "10")?,
            redis_url: var("REDIS_URL"),
            secret_key: require("SECRET_KEY")?,
            token_lifetime_hours: try_load("TOKEN_LIFETIME_HOURS", "24")?,
            media_root: try_load("MEDIA_ROOT", "media")?,
            media_url: normalize_media_url(&try_load::<String>("MEDIA_URL", "/media/")?),
        })
    }

    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_lifetime_hours)
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn require(key: &str) -> anyhow::Result<String> {
    var(key).ok_or_else(|| anyhow!("Environment variable {key} is required"))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("{e}")
        })
        .with_context(|| format!("Environment misconfigured: {key}"))
}

fn normalize_media_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_url_always_ends_with_slash() {
        assert_eq!(normalize_media_url("/media"), "/media/");
        assert_eq!(normalize_media_url("https://cdn.example.com/m/"), "https://cdn.example.com/m/");
    }
}
