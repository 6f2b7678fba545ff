// src/config.rs
use anyhow::{anyhow, Context, Result};
use log::warn;
use std::env;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3030;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub password: String,
    pub fred_api_key: Option<String>,
    pub port: u16,
    pub http_timeout: Duration,
}

impl AppConfig {
    /// Reads the process environment (after `dotenv` has populated it).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let password = non_empty("PASSWORD").ok_or_else(|| anyhow!("PASSWORD must be set"))?;

        let fred_api_key = non_empty("FRED_API_KEY").or_else(|| non_empty("fredapikey"));
        if fred_api_key.is_none() {
            warn!("No FRED API key configured; FRED-backed sections will show a key error");
        }

        let port = match non_empty("PORT") {
            Some(raw) => raw.parse::<u16>().context("PORT must be a number")?,
            None => {
                warn!("$PORT not set, defaulting to {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        let timeout_secs = match non_empty("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("HTTP_TIMEOUT_SECS must be a whole number of seconds")?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(AppConfig {
            password,
            fred_api_key,
            port,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
