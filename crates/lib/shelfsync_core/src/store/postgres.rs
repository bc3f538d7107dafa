//! Postgres backend.
//!
//! Runtime `sqlx` queries against the tables created by
//! [`crate::migrate::migrate`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    CharacteristicsStore, CredentialStore, ProductStore, StoreError, SyncRunStore,
};
use crate::models::{
    AccountCredential, CachedCharacteristics, CachedProduct, NewAccountCredential,
    NewCachedProduct, ProductCacheStats, ProductPage, SyncKind, SyncRun, SyncStatus,
};
use crate::uuid::uuidv7;

/// [`super::CacheStore`] over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Products
// =============================================================================

#[async_trait]
impl ProductStore for PgStore {
    async fn latest_product_refresh(
        &self,
        account_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(last_refreshed_at) FROM cached_products WHERE account_id = $1 AND active",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(latest)
    }

    async fn active_products_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<ProductPage, StoreError> {
        // Count and rows must agree even if a swap commits between them.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let (total, last_refreshed_at) = sqlx::query_as::<_, (i64, Option<DateTime<Utc>>)>(
            r#"
            SELECT COUNT(*), MAX(last_refreshed_at)
            FROM cached_products
            WHERE account_id = $1 AND active
            "#,
        )
        .bind(account_id)
        .fetch_one(&mut *tx)
        .await?;

        let products = sqlx::query_as::<_, CachedProduct>(
            r#"
            SELECT id, account_id, upstream_product_id, payload, upstream_updated_at,
                   position, last_refreshed_at, cache_generation, active
            FROM cached_products
            WHERE account_id = $1 AND active
            ORDER BY upstream_updated_at DESC NULLS LAST, position ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ProductPage {
            products,
            total,
            last_refreshed_at,
        })
    }

    async fn replace_account_products(
        &self,
        account_id: Uuid,
        rows: &[NewCachedProduct],
        refreshed_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialize swaps for one account across processes.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        let generation = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(MAX(cache_generation), 0) + 1
            FROM cached_products
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE cached_products SET active = FALSE WHERE account_id = $1 AND active")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO cached_products
                    (id, account_id, upstream_product_id, payload, upstream_updated_at,
                     position, last_refreshed_at, cache_generation, active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE)
                "#,
            )
            .bind(uuidv7())
            .bind(account_id)
            .bind(&row.upstream_product_id)
            .bind(&row.payload)
            .bind(row.upstream_updated_at)
            .bind(row.position)
            .bind(refreshed_at)
            .bind(generation)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(generation)
    }

    async fn deactivate_products_refreshed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE cached_products SET active = FALSE WHERE active AND last_refreshed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_inactive_products_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM cached_products WHERE NOT active AND last_refreshed_at < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn product_stats(
        &self,
        account_id: Option<Uuid>,
    ) -> Result<ProductCacheStats, StoreError> {
        let stats = sqlx::query_as::<_, ProductCacheStats>(
            r#"
            SELECT COUNT(*) AS total_cached_products,
                   COUNT(DISTINCT account_id) AS distinct_accounts,
                   MIN(last_refreshed_at) AS oldest_entry,
                   MAX(last_refreshed_at) AS newest_entry
            FROM cached_products
            WHERE active AND ($1::uuid IS NULL OR account_id = $1)
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

// =============================================================================
// Sync runs
// =============================================================================

#[async_trait]
impl SyncRunStore for PgStore {
    async fn start_sync_run(
        &self,
        account_id: Uuid,
        kind: SyncKind,
    ) -> Result<SyncRun, StoreError> {
        let run = sqlx::query_as::<_, SyncRun>(
            r#"
            INSERT INTO sync_runs (id, account_id, kind, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, account_id, kind, status, items_synced, error_message,
                      started_at, completed_at
            "#,
        )
        .bind(uuidv7())
        .bind(account_id)
        .bind(kind)
        .bind(SyncStatus::InProgress)
        .fetch_one(&self.pool)
        .await?;
        Ok(run)
    }

    async fn finish_sync_run(
        &self,
        run_id: Uuid,
        status: SyncStatus,
        items_synced: i64,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE sync_runs
            SET status = $2, items_synced = $3, error_message = $4, completed_at = now()
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(status)
        .bind(items_synced)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_sync_runs_started_before(
        &self,
        cutoff: DateTime<Utc>,
        error_message: &str,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sync_runs
            SET status = 'failed', error_message = $2, completed_at = now()
            WHERE status = 'in_progress' AND started_at < $1
            "#,
        )
        .bind(cutoff)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn get_sync_run(&self, run_id: Uuid) -> Result<Option<SyncRun>, StoreError> {
        let run = sqlx::query_as::<_, SyncRun>(
            r#"
            SELECT id, account_id, kind, status, items_synced, error_message,
                   started_at, completed_at
            FROM sync_runs
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }
}

// =============================================================================
// Characteristics
// =============================================================================

#[async_trait]
impl CharacteristicsStore for PgStore {
    async fn get_characteristics(
        &self,
        subject_id: i64,
    ) -> Result<Option<CachedCharacteristics>, StoreError> {
        let row = sqlx::query_as::<_, CachedCharacteristics>(
            r#"
            SELECT subject_id, data, last_refreshed_at, cache_generation, active
            FROM cached_characteristics
            WHERE subject_id = $1
            "#,
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_characteristics(
        &self,
        subject_id: i64,
        data: &serde_json::Value,
        refreshed_at: DateTime<Utc>,
    ) -> Result<CachedCharacteristics, StoreError> {
        let row = sqlx::query_as::<_, CachedCharacteristics>(
            r#"
            INSERT INTO cached_characteristics
                (subject_id, data, last_refreshed_at, cache_generation, active)
            VALUES ($1, $2, $3, 1, TRUE)
            ON CONFLICT (subject_id) DO UPDATE
            SET data = EXCLUDED.data,
                last_refreshed_at = EXCLUDED.last_refreshed_at,
                cache_generation = cached_characteristics.cache_generation + 1,
                active = TRUE
            RETURNING subject_id, data, last_refreshed_at, cache_generation, active
            "#,
        )
        .bind(subject_id)
        .bind(data)
        .bind(refreshed_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn deactivate_characteristics(&self, subject_id: i64) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE cached_characteristics SET active = FALSE WHERE subject_id = $1")
                .bind(subject_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn characteristics_stats(
        &self,
        expired_at: DateTime<Utc>,
    ) -> Result<(i64, i64), StoreError> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE last_refreshed_at <= $1)
            FROM cached_characteristics
            WHERE active
            "#,
        )
        .bind(expired_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}

// =============================================================================
// Credentials
// =============================================================================

#[async_trait]
impl CredentialStore for PgStore {
    async fn get_credential(&self, id: Uuid) -> Result<Option<AccountCredential>, StoreError> {
        let row = sqlx::query_as::<_, AccountCredential>(
            r#"
            SELECT id, name, environment, secret_encrypted, is_active,
                   seller_id, seller_name, trade_mark, created_at, updated_at
            FROM account_credentials
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_credential(
        &self,
        credential: &NewAccountCredential,
    ) -> Result<AccountCredential, StoreError> {
        let row = sqlx::query_as::<_, AccountCredential>(
            r#"
            INSERT INTO account_credentials
                (id, name, environment, secret_encrypted, seller_id, seller_name, trade_mark)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, environment, secret_encrypted, is_active,
                      seller_id, seller_name, trade_mark, created_at, updated_at
            "#,
        )
        .bind(uuidv7())
        .bind(&credential.name)
        .bind(&credential.environment)
        .bind(&credential.secret_encrypted)
        .bind(&credential.seller_id)
        .bind(&credential.seller_name)
        .bind(&credential.trade_mark)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_credentials(&self) -> Result<Vec<AccountCredential>, StoreError> {
        let rows = sqlx::query_as::<_, AccountCredential>(
            r#"
            SELECT id, name, environment, secret_encrypted, is_active,
                   seller_id, seller_name, trade_mark, created_at, updated_at
            FROM account_credentials
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn set_credential_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<AccountCredential>, StoreError> {
        let row = sqlx::query_as::<_, AccountCredential>(
            r#"
            UPDATE account_credentials
            SET is_active = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, name, environment, secret_encrypted, is_active,
                      seller_id, seller_name, trade_mark, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
