//! Record store connection settings, read from the environment.

use std::env;

use thiserror::Error;

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const MIN_TIMEOUT_MS: u64 = 250;
pub const DEFAULT_REQUEST_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct RecordStoreConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub timeout_ms: u64,
    pub request_attempts: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing MARKETPLACE_STORE_URL")]
    MissingStoreUrl,
    #[error("invalid MARKETPLACE_STORE_TIMEOUT_MS: {0}")]
    InvalidTimeoutMs(String),
    #[error("invalid MARKETPLACE_STORE_REQUEST_ATTEMPTS: {0}")]
    InvalidRequestAttempts(String),
}

impl RecordStoreConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            access_token: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            request_attempts: DEFAULT_REQUEST_ATTEMPTS,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = read("MARKETPLACE_STORE_URL").ok_or(ConfigError::MissingStoreUrl)?;
        let timeout_ms = read("MARKETPLACE_STORE_TIMEOUT_MS")
            .unwrap_or_else(|| DEFAULT_TIMEOUT_MS.to_string())
            .parse::<u64>()
            .map_err(|error| ConfigError::InvalidTimeoutMs(error.to_string()))?;
        let request_attempts = read("MARKETPLACE_STORE_REQUEST_ATTEMPTS")
            .unwrap_or_else(|| DEFAULT_REQUEST_ATTEMPTS.to_string())
            .parse::<usize>()
            .map_err(|error| ConfigError::InvalidRequestAttempts(error.to_string()))?;

        Ok(Self {
            base_url,
            api_key: read("MARKETPLACE_STORE_API_KEY"),
            access_token: read("MARKETPLACE_STORE_ACCESS_TOKEN"),
            timeout_ms: timeout_ms.max(MIN_TIMEOUT_MS),
            request_attempts: request_attempts.max(1),
        })
    }
}
