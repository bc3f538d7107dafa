//! Retry controller for upstream calls.
//!
//! Wraps exactly one logical upstream operation with bounded exponential
//! backoff: before retry `n` (1-based) the controller sleeps
//! `backoff_unit * 2^n`, i.e. 2s then 4s with the default unit. Only
//! failures accepted by [`is_retryable`] are retried; everything else, and
//! the final failure once the budget is spent, is returned unchanged.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::upstream::{UpstreamError, UpstreamErrorKind};

/// Additional attempts after the first one.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base unit multiplied by `2^attempt`.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Message fragments that mark a failure as transient.
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "network",
    "connection",
    "502",
    "503",
    "504",
    "rate limit",
    "too many requests",
    "temporary",
    "unavailable",
    "bad gateway",
    "gateway timeout",
];

/// Stateless retry policy; safe to share across concurrent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_backoff_unit(mut self, backoff_unit: Duration) -> Self {
        self.backoff_unit = backoff_unit;
        self
    }

    /// Total number of calls the policy may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Sleep before retry `attempt` (1-based).
    pub fn delay_for_retry(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(1u32 << attempt.min(16))
    }

    /// Run `call` until it succeeds, fails terminally, or the budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut attempt = 0;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= self.max_retries || !is_retryable(&err) {
                return Err(err);
            }

            attempt += 1;
            let delay = self.delay_for_retry(attempt);
            warn!(
                operation,
                attempt,
                max_retries = self.max_retries,
                delay_secs = delay.as_secs(),
                error = %err,
                "upstream call failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

/// Whether an upstream failure is worth another attempt.
///
/// Timeouts, connection failures, 429 and 502/503/504 always are. Credential
/// rejections, undecodable bodies and other 4xx never are. Remaining 5xx
/// statuses retry only when the message carries a transient marker.
pub fn is_retryable(err: &UpstreamError) -> bool {
    match err.kind {
        UpstreamErrorKind::Unauthorized | UpstreamErrorKind::Decode => false,
        UpstreamErrorKind::Timeout | UpstreamErrorKind::Transport => true,
        UpstreamErrorKind::HttpError(429 | 502 | 503 | 504) => true,
        UpstreamErrorKind::HttpError(status) if (400..500).contains(&status) => false,
        UpstreamErrorKind::HttpError(_) => has_transient_marker(&err.message),
    }
}

fn has_transient_marker(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}
