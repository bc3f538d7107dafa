//! reqwest-backed [`UpstreamClient`].
//!
//! Catalog and characteristics calls go to the content API, credential
//! validation to the common API. Every request carries the bearer credential
//! and the client-wide timeout from [`UpstreamConfig`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::models::{AccountIdentity, CatalogListRequest, CatalogPage};
use super::{UpstreamClient, UpstreamError, UpstreamErrorKind};
use crate::config::UpstreamConfig;

const CATALOG_LIST_PATH: &str = "catalog/list";
const PING_PATH: &str = "ping";
const SELLER_INFO_PATH: &str = "api/v1/seller-info";

/// HTTP client for the upstream marketplace API.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    content_api: Url,
    common_api: Url,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::new(UpstreamErrorKind::Transport, e.to_string()))?;
        Ok(Self {
            client,
            content_api: config.content_api_url.clone(),
            common_api: config.common_api_url.clone(),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        secret: &str,
    ) -> Result<T, UpstreamError> {
        let resp = request
            .bearer_auth(secret)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(UpstreamError::unauthorized());
        }
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(UpstreamError::http(status.as_u16(), &body));
        }

        resp.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::timeout()
            } else {
                UpstreamError::new(
                    UpstreamErrorKind::Decode,
                    format!("Invalid response body: {e}"),
                )
            }
        })
    }
}

/// Join `path` onto `base`, keeping any path prefix the base already has.
fn endpoint(base: &Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path)
}

fn classify_send_error(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::timeout()
    } else {
        UpstreamError::new(
            UpstreamErrorKind::Transport,
            format!("Network connection error: {e}"),
        )
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn fetch_catalog_page(
        &self,
        secret: &str,
        limit: u32,
        offset: u32,
    ) -> Result<CatalogPage, UpstreamError> {
        debug!(limit, offset, "requesting catalog page");
        let request = self
            .client
            .post(endpoint(&self.content_api, CATALOG_LIST_PATH))
            .json(&CatalogListRequest::new(limit, offset));
        self.send_json(request, secret).await
    }

    async fn fetch_subject_characteristics(
        &self,
        secret: &str,
        subject_id: i64,
    ) -> Result<serde_json::Value, UpstreamError> {
        debug!(subject_id, "requesting subject characteristics");
        let path = format!("subjects/{subject_id}/characteristics");
        let request = self.client.get(endpoint(&self.content_api, &path));
        self.send_json(request, secret).await
    }

    async fn validate_credential(&self, secret: &str) -> Result<AccountIdentity, UpstreamError> {
        let ping = self.client.get(endpoint(&self.common_api, PING_PATH));
        self.send_json::<serde_json::Value>(ping, secret).await?;

        let seller_info = self.client.get(endpoint(&self.common_api, SELLER_INFO_PATH));
        self.send_json(seller_info, secret).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let base = Url::parse("https://content-api.example.com/").unwrap();
        assert_eq!(
            endpoint(&base, CATALOG_LIST_PATH),
            "https://content-api.example.com/catalog/list"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let base = Url::parse("http://127.0.0.1:8080/proxy/v2").unwrap();
        assert_eq!(
            endpoint(&base, SELLER_INFO_PATH),
            "http://127.0.0.1:8080/proxy/v2/api/v1/seller-info"
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let config = UpstreamConfig {
            content_api_url: Url::parse("http://127.0.0.1:1").unwrap(),
            common_api_url: Url::parse("http://127.0.0.1:1").unwrap(),
            timeout: std::time::Duration::from_secs(5),
        };
        let upstream = HttpUpstream::new(&config).unwrap();
        let err = upstream
            .fetch_catalog_page("secret", 10, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err.kind,
            UpstreamErrorKind::Transport | UpstreamErrorKind::Timeout
        ));
    }
}
