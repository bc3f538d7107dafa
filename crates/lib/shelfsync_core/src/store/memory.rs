//! In-process backend.
//!
//! All tables sit behind one [`RwLock`]; every mutation takes the write side,
//! so a reader observes either the whole previous generation or the whole new
//! one. Used by tests and by embedders without Postgres.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CharacteristicsStore, CredentialStore, ProductStore, StoreError, SyncRunStore};
use crate::models::{
    AccountCredential, CachedCharacteristics, CachedProduct, NewAccountCredential,
    NewCachedProduct, ProductCacheStats, ProductPage, SyncKind, SyncRun, SyncStatus,
};
use crate::uuid::uuidv7;

#[derive(Debug, Default)]
struct Tables {
    credentials: HashMap<Uuid, AccountCredential>,
    products: Vec<CachedProduct>,
    sync_runs: HashMap<Uuid, SyncRun>,
    characteristics: HashMap<i64, CachedCharacteristics>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sync runs recorded for an account, oldest first.
    pub async fn sync_runs_for(&self, account_id: Uuid) -> Vec<SyncRun> {
        let tables = self.tables.read().await;
        let mut runs: Vec<SyncRun> = tables
            .sync_runs
            .values()
            .filter(|run| run.account_id == account_id)
            .cloned()
            .collect();
        runs.sort_by_key(|run| run.id);
        runs
    }

    /// Every product row of an account, including deactivated generations.
    pub async fn all_products_for(&self, account_id: Uuid) -> Vec<CachedProduct> {
        let tables = self.tables.read().await;
        tables
            .products
            .iter()
            .filter(|p| p.account_id == account_id)
            .cloned()
            .collect()
    }
}

/// Newest upstream update first, unknown update time last, then position.
fn display_order(a: &CachedProduct, b: &CachedProduct) -> Ordering {
    match (a.upstream_updated_at, b.upstream_updated_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then(a.position.cmp(&b.position))
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn latest_product_refresh(
        &self,
        account_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| p.account_id == account_id && p.active)
            .map(|p| p.last_refreshed_at)
            .max())
    }

    async fn active_products_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<ProductPage, StoreError> {
        let tables = self.tables.read().await;
        let mut active: Vec<&CachedProduct> = tables
            .products
            .iter()
            .filter(|p| p.account_id == account_id && p.active)
            .collect();
        active.sort_by(|a, b| display_order(a, b));

        let total = active.len() as i64;
        let last_refreshed_at = active.iter().map(|p| p.last_refreshed_at).max();
        let products = active
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect();

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
        let mut tables = self.tables.write().await;
        let generation = tables
            .products
            .iter()
            .filter(|p| p.account_id == account_id)
            .map(|p| p.cache_generation)
            .max()
            .unwrap_or(0)
            + 1;

        for product in tables
            .products
            .iter_mut()
            .filter(|p| p.account_id == account_id)
        {
            product.active = false;
        }

        tables.products.extend(rows.iter().map(|row| CachedProduct {
            id: uuidv7(),
            account_id,
            upstream_product_id: row.upstream_product_id.clone(),
            payload: row.payload.clone(),
            upstream_updated_at: row.upstream_updated_at,
            position: row.position,
            last_refreshed_at: refreshed_at,
            cache_generation: generation,
            active: true,
        }));
        Ok(generation)
    }

    async fn deactivate_products_refreshed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let mut cleared = 0;
        for product in tables
            .products
            .iter_mut()
            .filter(|p| p.active && p.last_refreshed_at < cutoff)
        {
            product.active = false;
            cleared += 1;
        }
        Ok(cleared)
    }

    async fn purge_inactive_products_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.products.len();
        tables
            .products
            .retain(|p| p.active || p.last_refreshed_at >= cutoff);
        Ok((before - tables.products.len()) as u64)
    }

    async fn product_stats(
        &self,
        account_id: Option<Uuid>,
    ) -> Result<ProductCacheStats, StoreError> {
        let tables = self.tables.read().await;
        let active: Vec<&CachedProduct> = tables
            .products
            .iter()
            .filter(|p| p.active && account_id.is_none_or(|id| p.account_id == id))
            .collect();

        let mut accounts: Vec<Uuid> = active.iter().map(|p| p.account_id).collect();
        accounts.sort();
        accounts.dedup();

        Ok(ProductCacheStats {
            total_cached_products: active.len() as i64,
            distinct_accounts: accounts.len() as i64,
            oldest_entry: active.iter().map(|p| p.last_refreshed_at).min(),
            newest_entry: active.iter().map(|p| p.last_refreshed_at).max(),
        })
    }
}

#[async_trait]
impl SyncRunStore for MemoryStore {
    async fn start_sync_run(
        &self,
        account_id: Uuid,
        kind: SyncKind,
    ) -> Result<SyncRun, StoreError> {
        let run = SyncRun {
            id: uuidv7(),
            account_id,
            kind,
            status: SyncStatus::InProgress,
            items_synced: 0,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.tables
            .write()
            .await
            .sync_runs
            .insert(run.id, run.clone());
        Ok(run)
    }

    async fn finish_sync_run(
        &self,
        run_id: Uuid,
        status: SyncStatus,
        items_synced: i64,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(run) = tables.sync_runs.get_mut(&run_id) {
            run.status = status;
            run.items_synced = items_synced;
            run.error_message = error_message.map(str::to_string);
            run.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn fail_sync_runs_started_before(
        &self,
        cutoff: DateTime<Utc>,
        error_message: &str,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut failed = 0;
        for run in tables
            .sync_runs
            .values_mut()
            .filter(|r| r.status == SyncStatus::InProgress && r.started_at < cutoff)
        {
            run.status = SyncStatus::Failed;
            run.error_message = Some(error_message.to_string());
            run.completed_at = Some(now);
            failed += 1;
        }
        Ok(failed)
    }

    async fn get_sync_run(&self, run_id: Uuid) -> Result<Option<SyncRun>, StoreError> {
        Ok(self.tables.read().await.sync_runs.get(&run_id).cloned())
    }
}

#[async_trait]
impl CharacteristicsStore for MemoryStore {
    async fn get_characteristics(
        &self,
        subject_id: i64,
    ) -> Result<Option<CachedCharacteristics>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .characteristics
            .get(&subject_id)
            .cloned())
    }

    async fn upsert_characteristics(
        &self,
        subject_id: i64,
        data: &serde_json::Value,
        refreshed_at: DateTime<Utc>,
    ) -> Result<CachedCharacteristics, StoreError> {
        let mut tables = self.tables.write().await;
        let row = tables
            .characteristics
            .entry(subject_id)
            .and_modify(|row| {
                row.data = data.clone();
                row.last_refreshed_at = refreshed_at;
                row.cache_generation += 1;
                row.active = true;
            })
            .or_insert_with(|| CachedCharacteristics {
                subject_id,
                data: data.clone(),
                last_refreshed_at: refreshed_at,
                cache_generation: 1,
                active: true,
            });
        Ok(row.clone())
    }

    async fn deactivate_characteristics(&self, subject_id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.characteristics.get_mut(&subject_id) {
            Some(row) => {
                row.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn characteristics_stats(
        &self,
        expired_at: DateTime<Utc>,
    ) -> Result<(i64, i64), StoreError> {
        let tables = self.tables.read().await;
        let active = tables.characteristics.values().filter(|row| row.active);
        let (mut total, mut expired) = (0, 0);
        for row in active {
            total += 1;
            if row.last_refreshed_at <= expired_at {
                expired += 1;
            }
        }
        Ok((total, expired))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_credential(&self, id: Uuid) -> Result<Option<AccountCredential>, StoreError> {
        Ok(self.tables.read().await.credentials.get(&id).cloned())
    }

    async fn insert_credential(
        &self,
        credential: &NewAccountCredential,
    ) -> Result<AccountCredential, StoreError> {
        let now = Utc::now();
        let row = AccountCredential {
            id: uuidv7(),
            name: credential.name.clone(),
            environment: credential.environment.clone(),
            secret_encrypted: credential.secret_encrypted.clone(),
            is_active: true,
            seller_id: credential.seller_id.clone(),
            seller_name: credential.seller_name.clone(),
            trade_mark: credential.trade_mark.clone(),
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .credentials
            .insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_credentials(&self) -> Result<Vec<AccountCredential>, StoreError> {
        let mut rows: Vec<AccountCredential> =
            self.tables.read().await.credentials.values().cloned().collect();
        rows.sort_by_key(|row| row.created_at);
        Ok(rows)
    }

    async fn set_credential_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<AccountCredential>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.credentials.get_mut(&id).map(|row| {
            row.is_active = is_active;
            row.updated_at = Utc::now();
            row.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use serde_json::json;

    use super::*;

    fn card(id: &str, updated: Option<&str>, position: i32) -> NewCachedProduct {
        NewCachedProduct {
            upstream_product_id: id.into(),
            payload: json!({"vendorCode": id}),
            upstream_updated_at: updated
                .map(|s| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)),
            position,
        }
    }

    #[tokio::test]
    async fn replace_bumps_generation_and_retires_previous_rows() {
        let store = MemoryStore::new();
        let account = Uuid::now_v7();
        let now = Utc::now();

        let first = store
            .replace_account_products(account, &[card("a", None, 0), card("b", None, 1)], now)
            .await
            .unwrap();
        let second = store
            .replace_account_products(account, &[card("c", None, 0)], now)
            .await
            .unwrap();

        assert_eq!((first, second), (1, 2));
        let page = store.active_products_page(account, 10, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.products[0].upstream_product_id, "c");
        assert_eq!(store.all_products_for(account).await.len(), 3);
    }

    #[tokio::test]
    async fn purge_deletes_only_old_inactive_rows() {
        let store = MemoryStore::new();
        let retired = Uuid::now_v7();
        let idle = Uuid::now_v7();
        let now = Utc::now();
        let old = now - TimeDelta::days(3);

        store
            .replace_account_products(retired, &[card("a", None, 0), card("b", None, 1)], old)
            .await
            .unwrap();
        store
            .replace_account_products(retired, &[card("c", None, 0)], now)
            .await
            .unwrap();
        store
            .replace_account_products(idle, &[card("d", None, 0)], old)
            .await
            .unwrap();

        let purged = store
            .purge_inactive_products_before(now - TimeDelta::days(2))
            .await
            .unwrap();

        assert_eq!(purged, 2);
        let left = store.all_products_for(retired).await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].upstream_product_id, "c");
        assert_eq!(store.all_products_for(idle).await.len(), 1);
    }

    #[tokio::test]
    async fn page_orders_by_upstream_update_then_position() {
        let store = MemoryStore::new();
        let account = Uuid::now_v7();
        let rows = [
            card("undated-late", None, 3),
            card("older", Some("2024-01-01T00:00:00Z"), 1),
            card("newer", Some("2024-06-01T00:00:00Z"), 2),
            card("undated-early", None, 0),
        ];
        store
            .replace_account_products(account, &rows, Utc::now())
            .await
            .unwrap();

        let page = store.active_products_page(account, 10, 0).await.unwrap();
        let ids: Vec<&str> = page
            .products
            .iter()
            .map(|p| p.upstream_product_id.as_str())
            .collect();
        assert_eq!(ids, ["newer", "older", "undated-early", "undated-late"]);

        let tail = store.active_products_page(account, 2, 3).await.unwrap();
        assert_eq!(tail.products.len(), 1);
        assert_eq!(tail.total, 4);
    }

    #[tokio::test]
    async fn upsert_increments_generation_in_place() {
        let store = MemoryStore::new();
        let t0 = Utc::now() - TimeDelta::days(1);
        store
            .upsert_characteristics(42, &json!({"v": 1}), t0)
            .await
            .unwrap();
        store.deactivate_characteristics(42).await.unwrap();
        let row = store
            .upsert_characteristics(42, &json!({"v": 2}), Utc::now())
            .await
            .unwrap();

        assert_eq!(row.cache_generation, 2);
        assert!(row.active);
        assert_eq!(row.data, json!({"v": 2}));
    }

    #[tokio::test]
    async fn stale_runs_are_failed_once() {
        let store = MemoryStore::new();
        let account = Uuid::now_v7();
        let run = store.start_sync_run(account, SyncKind::Full).await.unwrap();

        let cutoff = Utc::now() + TimeDelta::seconds(1);
        assert_eq!(
            store
                .fail_sync_runs_started_before(cutoff, "interrupted")
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .fail_sync_runs_started_before(cutoff, "interrupted")
                .await
                .unwrap(),
            0
        );
        let run = store.get_sync_run(run.id).await.unwrap().unwrap();
        assert_eq!(run.status, SyncStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("interrupted"));
    }
}
