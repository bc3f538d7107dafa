//! Durable keyed store behind the cache engines.
//!
//! The engines only see these traits. [`PgStore`] is the production backend;
//! [`MemoryStore`] keeps everything in-process behind one lock. Both make the
//! product swap and the characteristics upsert atomic with respect to readers.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AccountCredential, CachedCharacteristics, NewAccountCredential, NewCachedProduct,
    ProductCacheStats, ProductPage, SyncKind, SyncRun, SyncStatus,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Per-account product rows.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Newest `last_refreshed_at` among the account's active rows.
    async fn latest_product_refresh(
        &self,
        account_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Active rows ordered by upstream update time (newest first, unknown
    /// last), then upstream position. `total` and `last_refreshed_at` come
    /// from the same snapshot as `products`.
    async fn active_products_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<ProductPage, StoreError>;

    /// Deactivate every active row of the account and insert `rows` as the
    /// next generation, atomically. Returns the new generation.
    async fn replace_account_products(
        &self,
        account_id: Uuid,
        rows: &[NewCachedProduct],
        refreshed_at: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Deactivate active rows refreshed strictly before `cutoff`.
    async fn deactivate_products_refreshed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Delete inactive rows refreshed strictly before `cutoff`.
    async fn purge_inactive_products_before(&self, cutoff: DateTime<Utc>)
    -> Result<u64, StoreError>;

    async fn product_stats(&self, account_id: Option<Uuid>)
    -> Result<ProductCacheStats, StoreError>;
}

/// Append-only resync audit log.
#[async_trait]
pub trait SyncRunStore: Send + Sync {
    async fn start_sync_run(&self, account_id: Uuid, kind: SyncKind)
    -> Result<SyncRun, StoreError>;

    async fn finish_sync_run(
        &self,
        run_id: Uuid,
        status: SyncStatus,
        items_synced: i64,
        error_message: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Mark `in_progress` runs started before `cutoff` as failed.
    async fn fail_sync_runs_started_before(
        &self,
        cutoff: DateTime<Utc>,
        error_message: &str,
    ) -> Result<u64, StoreError>;

    async fn get_sync_run(&self, run_id: Uuid) -> Result<Option<SyncRun>, StoreError>;
}

/// Global per-subject characteristics rows.
#[async_trait]
pub trait CharacteristicsStore: Send + Sync {
    /// The subject's row, active or not.
    async fn get_characteristics(
        &self,
        subject_id: i64,
    ) -> Result<Option<CachedCharacteristics>, StoreError>;

    /// Insert generation 1 or bump the existing row's generation in place.
    /// The row is active afterwards.
    async fn upsert_characteristics(
        &self,
        subject_id: i64,
        data: &serde_json::Value,
        refreshed_at: DateTime<Utc>,
    ) -> Result<CachedCharacteristics, StoreError>;

    /// Returns `false` when no row exists for the subject.
    async fn deactivate_characteristics(&self, subject_id: i64) -> Result<bool, StoreError>;

    /// `(active rows, active rows refreshed at or before expired_at)`.
    async fn characteristics_stats(
        &self,
        expired_at: DateTime<Utc>,
    ) -> Result<(i64, i64), StoreError>;
}

/// Account credential records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(&self, id: Uuid) -> Result<Option<AccountCredential>, StoreError>;

    async fn insert_credential(
        &self,
        credential: &NewAccountCredential,
    ) -> Result<AccountCredential, StoreError>;

    async fn list_credentials(&self) -> Result<Vec<AccountCredential>, StoreError>;

    /// Returns the updated record, or `None` when it does not exist.
    async fn set_credential_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<AccountCredential>, StoreError>;
}

/// Everything the cache service needs from one backend.
pub trait CacheStore: ProductStore + SyncRunStore + CharacteristicsStore + CredentialStore {}

impl<T> CacheStore for T where
    T: ProductStore + SyncRunStore + CharacteristicsStore + CredentialStore
{
}
