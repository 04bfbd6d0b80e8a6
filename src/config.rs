// src/config.rs
//! Runtime configuration pulled from environment variables (a `.env` file is
//! honored in dev via `dotenvy`). The core only consumes these values; it
//! never loads files itself.

use std::collections::HashMap;
use std::env;

pub const DEFAULT_USER_AGENT: &str = "taiwan-markets-db/0.1";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub timezone: String,
    pub http_timeout: f64,
    pub http_max_retries: u32,
    pub http_backoff_base: f64,
    pub user_agent: String,
    pub finmind_token: Option<String>,
    pub proxy_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Taipei".to_string(),
            http_timeout: 15.0,
            http_max_retries: 5,
            http_backoff_base: 0.5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            finmind_token: None,
            proxy_url: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timezone: env_or("TZ", defaults.timezone),
            http_timeout: parse_env("HTTP_TIMEOUT", defaults.http_timeout),
            http_max_retries: parse_env("HTTP_MAX_RETRIES", defaults.http_max_retries),
            http_backoff_base: parse_env("HTTP_BACKOFF_BASE", defaults.http_backoff_base),
            user_agent: env_or("USER_AGENT", defaults.user_agent),
            finmind_token: non_empty(env::var("FINMIND_TOKEN").ok()),
            proxy_url: non_empty(env::var("PROXY_URL").ok()),
        }
    }

    /// Apply `key=value` overrides on top (CLI `--config` flags).
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for (key, value) in overrides {
            match key.as_str() {
                "timezone" => self.timezone = value.clone(),
                "http_timeout" => {
                    self.http_timeout = value.parse().unwrap_or(self.http_timeout)
                }
                "http_max_retries" => {
                    self.http_max_retries = value.parse().unwrap_or(self.http_max_retries)
                }
                "http_backoff_base" => {
                    self.http_backoff_base = value.parse().unwrap_or(self.http_backoff_base)
                }
                "user_agent" => self.user_agent = value.clone(),
                "finmind_token" => self.finmind_token = non_empty(Some(value.clone())),
                "proxy_url" => self.proxy_url = non_empty(Some(value.clone())),
                other => tracing::warn!(key = other, "ignoring unknown config override"),
            }
        }
        self
    }

    /// Default headers attached to every outgoing request.
    pub fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), self.user_agent.clone());
        if let Some(token) = &self.finmind_token {
            headers.insert("X-FinMind-Token".to_string(), token.clone());
        }
        headers
    }
}

fn env_or(key: &str, default: String) -> String {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default,
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
