//! Cache configuration.
//!
//! Everything the engines need besides their collaborators: TTLs, the retry
//! budget, the catalog sync strategy and where the upstream lives.

use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;
use url::Url;

use crate::retry::RetryPolicy;
use crate::sync::SyncStrategy;

pub const DEFAULT_PRODUCT_TTL_HOURS: i64 = 24;
pub const DEFAULT_CHARACTERISTICS_TTL_DAYS: i64 = 7;
pub const DEFAULT_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_MAX_PAGES: u32 = 10;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_STALE_RUN_MINUTES: i64 = 60;
pub const DEFAULT_CONTENT_API_URL: &str = "https://content-api.wildberries.ru";
pub const DEFAULT_COMMON_API_URL: &str = "https://common-api.wildberries.ru";

/// Upper bound for every duration setting, so that twice a TTL and `now`
/// minus it stay representable.
pub const MAX_DURATION_DAYS: i64 = 36_500;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Where and how to reach the upstream API.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub content_api_url: Url,
    pub common_api_url: Url,
    pub timeout: Duration,
}

/// Configuration shared by both cache engines.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Product cache validity window. The expiry sweep uses twice this.
    pub product_ttl: TimeDelta,
    /// Characteristics cache validity window.
    pub characteristics_ttl: TimeDelta,
    pub retry: RetryPolicy,
    pub sync_strategy: SyncStrategy,
    pub upstream: UpstreamConfig,
    /// `in_progress` sync runs older than this are considered interrupted.
    pub stale_run_after: TimeDelta,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            product_ttl: TimeDelta::hours(DEFAULT_PRODUCT_TTL_HOURS),
            characteristics_ttl: TimeDelta::days(DEFAULT_CHARACTERISTICS_TTL_DAYS),
            retry: RetryPolicy::default(),
            sync_strategy: SyncStrategy::SinglePage {
                page_size: DEFAULT_PAGE_SIZE,
            },
            upstream: UpstreamConfig::default(),
            stale_run_after: TimeDelta::minutes(DEFAULT_STALE_RUN_MINUTES),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            content_api_url: parse_default_url(DEFAULT_CONTENT_API_URL),
            common_api_url: parse_default_url(DEFAULT_COMMON_API_URL),
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

#[allow(clippy::expect_used)]
fn parse_default_url(raw: &str) -> Url {
    Url::parse(raw).expect("default upstream URL is valid")
}

impl CacheConfig {
    /// Reads configuration from environment variables with the defaults below.
    ///
    /// | Variable                             | Default                              |
    /// |--------------------------------------|--------------------------------------|
    /// | `SHELFSYNC_PRODUCT_TTL_HOURS`        | `24`                                 |
    /// | `SHELFSYNC_CHARACTERISTICS_TTL_DAYS` | `7`                                  |
    /// | `SHELFSYNC_MAX_RETRIES`              | `2`                                  |
    /// | `SHELFSYNC_SYNC_STRATEGY`            | `single-page`                        |
    /// | `SHELFSYNC_PAGE_SIZE`                | `1000`                               |
    /// | `SHELFSYNC_MAX_PAGES`                | `10`                                 |
    /// | `SHELFSYNC_CONTENT_API_URL`          | `https://content-api.wildberries.ru` |
    /// | `SHELFSYNC_COMMON_API_URL`           | `https://common-api.wildberries.ru`  |
    /// | `SHELFSYNC_UPSTREAM_TIMEOUT_SECS`    | `60`                                 |
    /// | `SHELFSYNC_STALE_RUN_MINUTES`        | `60`                                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CacheConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let product_ttl_hours: i64 = parse_or(
            &lookup,
            "SHELFSYNC_PRODUCT_TTL_HOURS",
            DEFAULT_PRODUCT_TTL_HOURS,
        )?;
        let characteristics_ttl_days: i64 = parse_or(
            &lookup,
            "SHELFSYNC_CHARACTERISTICS_TTL_DAYS",
            DEFAULT_CHARACTERISTICS_TTL_DAYS,
        )?;
        let max_retries: u32 = parse_or(
            &lookup,
            "SHELFSYNC_MAX_RETRIES",
            crate::retry::DEFAULT_MAX_RETRIES,
        )?;
        let page_size: u32 = parse_or(&lookup, "SHELFSYNC_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let max_pages: u32 = parse_or(&lookup, "SHELFSYNC_MAX_PAGES", DEFAULT_MAX_PAGES)?;
        let timeout_secs: u64 = parse_or(
            &lookup,
            "SHELFSYNC_UPSTREAM_TIMEOUT_SECS",
            DEFAULT_UPSTREAM_TIMEOUT_SECS,
        )?;
        let stale_run_minutes: i64 = parse_or(
            &lookup,
            "SHELFSYNC_STALE_RUN_MINUTES",
            DEFAULT_STALE_RUN_MINUTES,
        )?;

        let product_ttl = duration_setting(
            "SHELFSYNC_PRODUCT_TTL_HOURS",
            product_ttl_hours,
            TimeDelta::try_hours,
        )?;
        let characteristics_ttl = duration_setting(
            "SHELFSYNC_CHARACTERISTICS_TTL_DAYS",
            characteristics_ttl_days,
            TimeDelta::try_days,
        )?;
        let stale_run_after = duration_setting(
            "SHELFSYNC_STALE_RUN_MINUTES",
            stale_run_minutes,
            TimeDelta::try_minutes,
        )?;
        require_positive("SHELFSYNC_PAGE_SIZE", i64::from(page_size))?;
        require_positive("SHELFSYNC_MAX_PAGES", i64::from(max_pages))?;

        let strategy_name = lookup("SHELFSYNC_SYNC_STRATEGY");
        let sync_strategy = match strategy_name.as_deref() {
            None => SyncStrategy::SinglePage { page_size },
            Some(name) => SyncStrategy::from_name(name, page_size, max_pages).ok_or_else(|| {
                ConfigError::Invalid {
                    key: "SHELFSYNC_SYNC_STRATEGY".into(),
                    value: name.into(),
                }
            })?,
        };

        let content_api_url =
            url_or(&lookup, "SHELFSYNC_CONTENT_API_URL", DEFAULT_CONTENT_API_URL)?;
        let common_api_url = url_or(&lookup, "SHELFSYNC_COMMON_API_URL", DEFAULT_COMMON_API_URL)?;

        Ok(Self {
            product_ttl,
            characteristics_ttl,
            retry: RetryPolicy::new(max_retries),
            sync_strategy,
            upstream: UpstreamConfig {
                content_api_url,
                common_api_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            stale_run_after,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.into(),
            value: raw,
        }),
    }
}

fn url_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<Url, ConfigError> {
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid {
        key: key.into(),
        value: raw,
    })
}

/// Positive `value` in `unit`, at most [`MAX_DURATION_DAYS`] long.
fn duration_setting(
    key: &str,
    value: i64,
    unit: fn(i64) -> Option<TimeDelta>,
) -> Result<TimeDelta, ConfigError> {
    require_positive(key, value)?;
    let max = TimeDelta::days(MAX_DURATION_DAYS);
    unit(value)
        .filter(|duration| *duration <= max)
        .ok_or_else(|| ConfigError::Invalid {
            key: key.into(),
            value: value.to_string(),
        })
}

fn require_positive(key: &str, value: i64) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: key.into(),
            value: value.to_string(),
        })
    }
}
