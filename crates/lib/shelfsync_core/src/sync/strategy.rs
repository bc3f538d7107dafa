//! Catalog fetch strategies.
//!
//! The upstream `catalog/list` endpoint ignores `offset`: every call returns
//! the first page. [`SyncStrategy::SinglePage`] accepts that and makes one
//! call at the page size. [`SyncStrategy::OffsetPaging`] walks offsets anyway
//! up to `max_pages`, so against the real upstream it re-reads the first page
//! until a short page or the cap stops it. Duplicates it collects are
//! collapsed at swap time.

use serde_json::Value;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;
use crate::upstream::{UpstreamClient, UpstreamError};

/// How a resync pages through the upstream catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    SinglePage { page_size: u32 },
    OffsetPaging { page_size: u32, max_pages: u32 },
}

impl SyncStrategy {
    pub fn from_name(name: &str, page_size: u32, max_pages: u32) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "single-page" | "single_page" => Some(Self::SinglePage { page_size }),
            "offset-paging" | "offset_paging" => Some(Self::OffsetPaging {
                page_size,
                max_pages,
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SinglePage { .. } => "single-page",
            Self::OffsetPaging { .. } => "offset-paging",
        }
    }

    fn page_size(&self) -> u32 {
        match *self {
            Self::SinglePage { page_size } | Self::OffsetPaging { page_size, .. } => page_size,
        }
    }

    fn max_pages(&self) -> u32 {
        match *self {
            Self::SinglePage { .. } => 1,
            Self::OffsetPaging { max_pages, .. } => max_pages,
        }
    }
}

/// Page-level failure after some cards were already collected.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialFailure {
    pub offset: u32,
    pub error: UpstreamError,
}

/// Cards collected by one fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedCatalog {
    pub cards: Vec<Value>,
    pub pages_fetched: u32,
    pub partial: Option<PartialFailure>,
}

/// Fetch the catalog according to `strategy`, retrying each page under
/// `retry`. A page failure with nothing collected yet is a hard error;
/// otherwise the cards gathered so far come back with `partial` set.
pub async fn fetch_catalog(
    upstream: &dyn UpstreamClient,
    retry: &RetryPolicy,
    strategy: &SyncStrategy,
    secret: &str,
) -> Result<FetchedCatalog, UpstreamError> {
    let page_size = strategy.page_size();
    let max_pages = strategy.max_pages();
    let mut fetched = FetchedCatalog::default();
    let mut offset = 0u32;

    while fetched.pages_fetched < max_pages {
        let page = retry
            .run("catalog page", || {
                upstream.fetch_catalog_page(secret, page_size, offset)
            })
            .await;

        let page = match page {
            Ok(page) => page,
            Err(error) if fetched.cards.is_empty() => return Err(error),
            Err(error) => {
                warn!(offset, error = %error, "catalog page failed, keeping collected cards");
                fetched.partial = Some(PartialFailure { offset, error });
                return Ok(fetched);
            }
        };

        fetched.pages_fetched += 1;
        let received = page.cards.len();
        debug!(offset, received, "catalog page received");
        fetched.cards.extend(page.cards);

        if received < page_size as usize {
            return Ok(fetched);
        }
        offset = offset.saturating_add(page_size);
    }

    if matches!(strategy, SyncStrategy::OffsetPaging { .. }) {
        warn!(
            max_pages,
            collected = fetched.cards.len(),
            "page cap reached; upstream offset is not honoured"
        );
    }
    Ok(fetched)
}
