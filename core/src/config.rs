//! Client configuration.
//!
//! Read once when the client is constructed. Values come from
//! `ClientConfig::default()`, the process environment, or explicit struct
//! literals in tests.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const ENV_BASE_URL: &str = "API_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "API_TIMEOUT_MS";
pub const ENV_RETRY_ATTEMPTS: &str = "API_RETRY_ATTEMPTS";
pub const ENV_RETRY_DELAY_MS: &str = "API_RETRY_DELAY_MS";
pub const ENV_CACHE_MAX_SIZE: &str = "API_CACHE_MAX_SIZE";
pub const ENV_CACHE_TTL_MS: &str = "API_CACHE_TTL_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Every option the client recognizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Prefix joined to relative endpoints. Absolute URLs bypass it.
    pub base_url: String,
    /// Deadline for a whole call, retries included.
    pub timeout: Duration,
    /// Extra attempts after the first failed transport call.
    pub retry_attempts: u32,
    /// Base of the exponential backoff: `retry_delay * 2^attempt`.
    pub retry_delay: Duration,
    pub cache_max_size: usize,
    /// TTL for cached GET responses when the call does not set one.
    pub cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            cache_max_size: 100,
            cache_ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Build from `API_*` environment variables, defaulting anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(name) {
                Some(raw) => parse_number::<u64>(name, &raw).map(Duration::from_millis),
                None => Ok(default),
            }
        };

        Ok(Self {
            base_url: lookup(ENV_BASE_URL).unwrap_or(defaults.base_url),
            timeout: millis(ENV_TIMEOUT_MS, defaults.timeout)?,
            retry_attempts: match lookup(ENV_RETRY_ATTEMPTS) {
                Some(raw) => parse_number(ENV_RETRY_ATTEMPTS, &raw)?,
                None => defaults.retry_attempts,
            },
            retry_delay: millis(ENV_RETRY_DELAY_MS, defaults.retry_delay)?,
            cache_max_size: match lookup(ENV_CACHE_MAX_SIZE) {
                Some(raw) => parse_number(ENV_CACHE_MAX_SIZE, &raw)?,
                None => defaults.cache_max_size,
            },
            cache_ttl: millis(ENV_CACHE_TTL_MS, defaults.cache_ttl)?,
        })
    }
}

/// Out-of-range values for the target type are rejected, never truncated.
fn parse_number<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: raw.to_string(),
    })
}
