//! Upstream marketplace API client.
//!
//! [`UpstreamClient`] is the only way the cache engines reach the network.
//! Implementations do pure I/O plus classification: every failure comes back
//! as an [`UpstreamError`] tagged with an [`UpstreamErrorKind`]. Retrying is
//! the caller's business (see [`crate::retry`]).

pub mod http;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use models::{AccountIdentity, CatalogPage};

/// Classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// The credential was rejected (HTTP 401).
    Unauthorized,
    /// The request did not complete within the configured timeout.
    Timeout,
    /// Any other non-success HTTP status.
    HttpError(u16),
    /// Connection-level failure before a response arrived.
    Transport,
    /// A success response whose body could not be decoded.
    Decode,
}

/// Uniform upstream failure: a kind plus the message observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            UpstreamErrorKind::Unauthorized,
            "Invalid token or unauthorized",
        )
    }

    pub fn timeout() -> Self {
        Self::new(UpstreamErrorKind::Timeout, "Request timeout")
    }

    /// Non-success HTTP response, formatted as `HTTP <status>: <body>`.
    pub fn http(status: u16, body: &str) -> Self {
        Self::new(
            UpstreamErrorKind::HttpError(status),
            format!("HTTP {status}: {body}"),
        )
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            UpstreamErrorKind::HttpError(status) => Some(status),
            UpstreamErrorKind::Unauthorized => Some(401),
            _ => None,
        }
    }
}

/// Authenticated access to the catalog, characteristics and identity endpoints.
///
/// `secret` is always the decrypted credential.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// `POST /catalog/list` with `{cursor: {limit, offset}, filter: {withPhoto: -1}}`.
    ///
    /// The upstream ignores `offset`; every call returns the first page.
    async fn fetch_catalog_page(
        &self,
        secret: &str,
        limit: u32,
        offset: u32,
    ) -> Result<CatalogPage, UpstreamError>;

    /// Per-subject characteristics document, returned as-is.
    async fn fetch_subject_characteristics(
        &self,
        secret: &str,
        subject_id: i64,
    ) -> Result<serde_json::Value, UpstreamError>;

    /// `GET /ping` followed by `GET /api/v1/seller-info`.
    async fn validate_credential(&self, secret: &str) -> Result<AccountIdentity, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_message_carries_status_and_body() {
        let err = UpstreamError::http(503, "Service Unavailable");
        assert_eq!(err.kind, UpstreamErrorKind::HttpError(503));
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn unauthorized_reports_401() {
        assert_eq!(UpstreamError::unauthorized().status(), Some(401));
        assert_eq!(UpstreamError::timeout().status(), None);
    }
}
