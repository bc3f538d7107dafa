//! Resync machinery shared by the product cache: fetch strategies and the
//! report returned to callers that triggered a resync.

pub mod strategy;

use serde::Serialize;
use uuid::Uuid;

pub use strategy::{FetchedCatalog, PartialFailure, SyncStrategy, fetch_catalog};

use crate::models::SyncStatus;

/// Message recorded on runs found `in_progress` by the recovery pass.
pub const INTERRUPTED_MESSAGE: &str = "interrupted";

/// Outcome of one resync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    /// `None` when the audit row could not be written.
    pub run_id: Option<Uuid>,
    pub status: SyncStatus,
    pub items_synced: i64,
    /// Cards dropped for lacking a product identifier.
    pub skipped: usize,
    /// Cards dropped as repeats of an earlier product id.
    pub duplicates: usize,
    pub pages_fetched: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_error: Option<String>,
}

impl SyncReport {
    /// Warning surfaced to the caller for a partial sync.
    pub fn warning(&self) -> Option<String> {
        self.partial_error
            .as_ref()
            .map(|err| format!("Partial sync completed. {err}"))
    }
}

/// Text stored as `partial_error` for a page failure at `offset`.
pub fn partial_error_text(partial: &PartialFailure) -> String {
    format!("Failed at offset {}: {}", partial.offset, partial.error)
}
