use std::time::Duration;

use anyhow::{Context, Result};

use crate::poller::DEFAULT_POLL_INTERVAL;

/// Notifier configuration loaded from environment variables.
///
/// The session values are optional on purpose: the notifier starts without
/// them and simply keeps the badge hidden, matching the signed-out state.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub poll_interval: Duration,
    pub session_token: Option<String>,
    pub session_user: Option<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let poll_interval = match std::env::var("POLL_INTERVAL_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .context("POLL_INTERVAL_SECS must be a whole number of seconds")?,
            ),
            Err(_) => DEFAULT_POLL_INTERVAL,
        };

        Ok(Config {
            api_base_url: require_env("API_BASE_URL")?,
            poll_interval,
            session_token: std::env::var("SESSION_TOKEN").ok(),
            session_user: std::env::var("SESSION_USER").ok(),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
