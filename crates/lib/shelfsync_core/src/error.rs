//! Error taxonomy for the cache engines.

use thiserror::Error;

use crate::credentials::CipherError;
use crate::retry::is_retryable;
use crate::store::StoreError;
use crate::upstream::{UpstreamError, UpstreamErrorKind};

/// Failures surfaced by the cache engines and the service facade.
///
/// Partial syncs are not errors: they complete with a warning.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Credential or cache row absent.
    #[error("{0}")]
    NotFound(String),

    /// Credential rejected upstream or disabled locally.
    #[error("{0}")]
    Unauthorized(String),

    /// Timeout, 5xx or rate limit. Retryable ones outlived the retry budget.
    #[error("{0}")]
    TransientUpstream(UpstreamError),

    /// Upstream failure that retrying cannot fix.
    #[error("{0}")]
    TerminalUpstream(UpstreamError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Credential cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Stable machine-readable kind used in envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::TransientUpstream(_) => "transient_upstream",
            Self::TerminalUpstream(_) => "terminal_upstream",
            Self::Persistence(_) => "persistence_error",
            Self::Validation(_) => "validation",
            Self::Cipher(_) => "cipher",
            Self::Internal(_) => "internal",
        }
    }
}

/// Every 5xx is transient here, even one the retry policy gave up on early.
impl From<UpstreamError> for CacheError {
    fn from(err: UpstreamError) -> Self {
        match err.kind {
            UpstreamErrorKind::Unauthorized => Self::Unauthorized(err.message),
            UpstreamErrorKind::HttpError(500..=599) => Self::TransientUpstream(err),
            _ if is_retryable(&err) => Self::TransientUpstream(err),
            _ => Self::TerminalUpstream(err),
        }
    }
}
