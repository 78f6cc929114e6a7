use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_STATE_FILE: &str = ".bitewise/session.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client settings, normally read from the environment (see [`ClientConfig::from_env`]).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_prefix: String,
    pub state_file: PathBuf,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `api_url` with every other field defaulted.
    pub fn for_url(api_url: impl Into<String>) -> Self {
        Self { api_url: api_url.into(), ..Self::default() }
    }

    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let api_url = lookup("BITEWISE_API_URL").unwrap_or(defaults.api_url);
        let api_prefix = lookup("BITEWISE_API_PREFIX").unwrap_or(defaults.api_prefix);
        let state_file = lookup("BITEWISE_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_file);

        let request_timeout = match lookup("BITEWISE_REQUEST_TIMEOUT_SECS") {
            None => defaults.request_timeout,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(AppError::Config(format!(
                        "BITEWISE_REQUEST_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                    )))
                }
            },
        };

        Ok(Self { api_url, api_prefix, state_file, request_timeout })
    }

    /// Joins base URL, prefix and an endpoint path without doubled slashes.
    pub fn endpoint_url(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        if prefix.is_empty() {
            format!("{base}/{path}")
        } else {
            format!("{base}/{prefix}/{path}")
        }
    }
}
