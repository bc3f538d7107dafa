//! Wire models for the upstream content and common APIs.

use serde::{Deserialize, Serialize};

/// Request body for `POST /catalog/list`.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogListRequest {
    pub cursor: CatalogCursor,
    pub filter: CatalogFilter,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CatalogCursor {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilter {
    /// `-1` means "cards with and without photos".
    pub with_photo: i32,
}

impl CatalogListRequest {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            cursor: CatalogCursor { limit, offset },
            filter: CatalogFilter { with_photo: -1 },
        }
    }
}

/// One page of catalog cards. Cards are opaque documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub cards: Vec<serde_json::Value>,
    #[serde(default)]
    pub cursor: serde_json::Value,
}

/// Seller identity returned by `GET /api/v1/seller-info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub trade_mark: String,
}
