//! Environment-driven configuration.
//!
//! Every tunable is read from an `ENVISION_*` variable with the defaults below. Nothing
//! downstream hardcodes a URL, timeout, interval or retry bound.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ENVISION_API_BASE_URL` | `http://localhost:8000` |
//! | `ENVISION_API_TIMEOUT_MS` | `30000` |
//! | `ENVISION_API_TOKEN` | unset |
//! | `ENVISION_REFRESH_INTERVAL_MS` | `20000` (`0` disables polling) |
//! | `ENVISION_STALE_TIME_MS` | `10000` |
//! | `ENVISION_EXPIRE_TIME_MS` | `300000` |
//! | `ENVISION_CACHE_IDLE_MS` | `300000` |
//! | `ENVISION_MAX_RETRIES` | `2` |
//! | `ENVISION_RETRY_BASE_DELAY_MS` | `1000` |
//! | `ENVISION_RETRY_MAX_DELAY_MS` | `30000` |
//! | `ENVISION_RETRY_BACKOFF` | `exponential` (or `fixed`, waiting the base delay each time) |
//! | `ENVISION_RETRY_JITTER` | `false` (exponential only) |
//! | `ENVISION_DEGRADE_TO_PLACEHOLDER` | `false` |

use std::time::Duration;

use crate::cache::QueryOptions;
use crate::endpoints::FallbackPolicy;
use crate::error::ConfigError;
use crate::retry::RetryConfig;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 20_000;
pub const DEFAULT_STALE_TIME_MS: u64 = 10_000;
pub const DEFAULT_EXPIRE_TIME_MS: u64 = 300_000;
pub const DEFAULT_CACHE_IDLE_MS: u64 = 300_000;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Connection settings for the analytics API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub query: QueryOptions,
    /// Idle period after which an unused cache entry may be evicted.
    pub cache_idle: Duration,
    pub fallback: FallbackPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            retry: RetryConfig::exponential(
                DEFAULT_MAX_RETRIES,
                Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
                Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            ),
            query: QueryOptions {
                stale_time: Duration::from_millis(DEFAULT_STALE_TIME_MS),
                expire_time: Duration::from_millis(DEFAULT_EXPIRE_TIME_MS),
                refetch_interval: Some(Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS)),
            },
            cache_idle: Duration::from_millis(DEFAULT_CACHE_IDLE_MS),
            fallback: FallbackPolicy::Propagate,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// Unset and blank variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(base_url) = read("ENVISION_API_BASE_URL") {
            config.api.base_url = base_url;
        }
        if let Some(timeout) = read_millis(&read, "ENVISION_API_TIMEOUT_MS")? {
            config.api.timeout = timeout;
        }
        config.api.token = read("ENVISION_API_TOKEN");

        if let Some(interval) = read_millis(&read, "ENVISION_REFRESH_INTERVAL_MS")? {
            config.query.refetch_interval = (!interval.is_zero()).then_some(interval);
        }
        if let Some(stale_time) = read_millis(&read, "ENVISION_STALE_TIME_MS")? {
            config.query.stale_time = stale_time;
        }
        if let Some(expire_time) = read_millis(&read, "ENVISION_EXPIRE_TIME_MS")? {
            config.query.expire_time = expire_time;
        }
        if let Some(idle) = read_millis(&read, "ENVISION_CACHE_IDLE_MS")? {
            config.cache_idle = idle;
        }

        let max_retries = match read("ENVISION_MAX_RETRIES") {
            Some(value) => parse_value::<u32>("ENVISION_MAX_RETRIES", value, "a retry count")?,
            None => DEFAULT_MAX_RETRIES,
        };
        let base_delay = read_millis(&read, "ENVISION_RETRY_BASE_DELAY_MS")?
            .unwrap_or(Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS));
        let max_delay = read_millis(&read, "ENVISION_RETRY_MAX_DELAY_MS")?
            .unwrap_or(Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS));
        let jitter = read("ENVISION_RETRY_JITTER")
            .map(|value| parse_bool("ENVISION_RETRY_JITTER", value))
            .transpose()?
            .unwrap_or(false);
        config.retry = match read("ENVISION_RETRY_BACKOFF").as_deref() {
            None | Some("exponential") => {
                let mut retry = RetryConfig::exponential(max_retries, base_delay, max_delay);
                retry.backoff = retry.backoff.with_jitter(jitter);
                retry
            }
            Some("fixed") => RetryConfig::fixed(base_delay, max_retries),
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "ENVISION_RETRY_BACKOFF",
                    value: other.to_owned(),
                    expected: "exponential or fixed",
                })
            }
        };

        if let Some(value) = read("ENVISION_DEGRADE_TO_PLACEHOLDER") {
            config.fallback = if parse_bool("ENVISION_DEGRADE_TO_PLACEHOLDER", value)? {
                FallbackPolicy::Placeholder
            } else {
                FallbackPolicy::Propagate
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.api.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "ENVISION_API_BASE_URL",
                value: self.api.base_url.clone(),
                expected: "a non-empty URL",
            });
        }

        if self.api.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "ENVISION_API_TIMEOUT_MS",
                value: String::from("0"),
                expected: "a positive number of milliseconds",
            });
        }

        if self.query.stale_time > self.query.expire_time {
            return Err(ConfigError::Inconsistent {
                message: format!(
                    "stale time ({}ms) exceeds expire time ({}ms)",
                    self.query.stale_time.as_millis(),
                    self.query.expire_time.as_millis()
                ),
            });
        }

        Ok(())
    }
}

fn read_millis<R>(read: &R, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    R: Fn(&str) -> Option<String>,
{
    read(key)
        .map(|value| parse_value::<u64>(key, value, "a number of milliseconds"))
        .transpose()
        .map(|millis| millis.map(Duration::from_millis))
}

fn parse_value<T: std::str::FromStr>(
    key: &'static str,
    value: String,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key,
        value,
        expected,
    })
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            expected: "true or false",
        }),
    }
}
