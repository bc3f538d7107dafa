//! Product cache models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Card field holding the product identifier.
pub const PRODUCT_ID_FIELD: &str = "vendorCode";

/// Card field holding the product's own update timestamp.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

// =============================================================================
// DB row structs
// =============================================================================

/// Database row for `cached_products`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CachedProduct {
    pub id: Uuid,
    pub account_id: Uuid,
    pub upstream_product_id: String,
    pub payload: Value,
    pub upstream_updated_at: Option<DateTime<Utc>>,
    /// Position of the card in the upstream response.
    pub position: i32,
    pub last_refreshed_at: DateTime<Utc>,
    pub cache_generation: i64,
    pub active: bool,
}

/// A card accepted for insertion by a resync.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCachedProduct {
    pub upstream_product_id: String,
    pub payload: Value,
    pub upstream_updated_at: Option<DateTime<Utc>>,
    pub position: i32,
}

impl NewCachedProduct {
    /// Builds a row from an upstream card, or `None` when the card has no
    /// usable product identifier.
    pub fn from_card(card: Value, position: i32) -> Option<Self> {
        let upstream_product_id = match card.get(PRODUCT_ID_FIELD)? {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let upstream_updated_at = card
            .get(UPDATED_AT_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Some(Self {
            upstream_product_id,
            payload: card,
            upstream_updated_at,
            position,
        })
    }
}

// =============================================================================
// Read-path results
// =============================================================================

/// One page of active products plus the metadata read with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductPage {
    pub products: Vec<CachedProduct>,
    /// Active rows for the account, ignoring `limit`/`offset`.
    pub total: i64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Aggregate statistics over active product rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct ProductCacheStats {
    pub total_cached_products: i64,
    pub distinct_accounts: i64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}
