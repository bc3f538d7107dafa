//! Shared fixtures: a scripted upstream and store helpers.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use shelfsync_core::credentials::PlaintextCipher;
use shelfsync_core::models::{
    AccountCredential, CachedCharacteristics, NewAccountCredential, NewCachedProduct,
    ProductCacheStats, ProductPage, SyncKind, SyncRun, SyncStatus,
};
use shelfsync_core::products::ProductCache;
use shelfsync_core::retry::RetryPolicy;
use shelfsync_core::store::{
    CacheStore, CharacteristicsStore, CredentialStore, MemoryStore, ProductStore, StoreError,
    SyncRunStore,
};
use shelfsync_core::sync::SyncStrategy;
use shelfsync_core::upstream::{AccountIdentity, CatalogPage, UpstreamClient, UpstreamError};

pub fn product_ttl() -> TimeDelta {
    TimeDelta::hours(24)
}

// =============================================================================
// Scripted upstream
// =============================================================================

/// Upstream stub. Catalog responses are taken from a queue, then from the
/// `always` response, then default to an empty page.
#[derive(Default)]
pub struct StubUpstream {
    pages: Mutex<VecDeque<Result<CatalogPage, UpstreamError>>>,
    always: Mutex<Option<Result<CatalogPage, UpstreamError>>>,
    characteristics: Mutex<HashMap<i64, Result<Value, UpstreamError>>>,
    identity: Mutex<Option<Result<AccountIdentity, UpstreamError>>>,
    catalog_delay: Mutex<Option<Duration>>,
    catalog_calls: AtomicU32,
    characteristics_calls: AtomicU32,
    secrets_seen: Mutex<Vec<String>>,
}

impl StubUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_page(&self, result: Result<CatalogPage, UpstreamError>) {
        self.pages.lock().unwrap().push_back(result);
    }

    pub fn always(&self, result: Result<CatalogPage, UpstreamError>) {
        *self.always.lock().unwrap() = Some(result);
    }

    pub fn set_characteristics(&self, subject_id: i64, result: Result<Value, UpstreamError>) {
        self.characteristics
            .lock()
            .unwrap()
            .insert(subject_id, result);
    }

    pub fn set_identity(&self, result: Result<AccountIdentity, UpstreamError>) {
        *self.identity.lock().unwrap() = Some(result);
    }

    pub fn set_catalog_delay(&self, delay: Duration) {
        *self.catalog_delay.lock().unwrap() = Some(delay);
    }

    pub fn catalog_calls(&self) -> u32 {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub fn characteristics_calls(&self) -> u32 {
        self.characteristics_calls.load(Ordering::SeqCst)
    }

    pub fn secrets_seen(&self) -> Vec<String> {
        self.secrets_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamClient for StubUpstream {
    async fn fetch_catalog_page(
        &self,
        secret: &str,
        _limit: u32,
        _offset: u32,
    ) -> Result<CatalogPage, UpstreamError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        self.secrets_seen.lock().unwrap().push(secret.to_string());
        let delay = *self.catalog_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.pages.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => self
                .always
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(CatalogPage::default())),
        }
    }

    async fn fetch_subject_characteristics(
        &self,
        secret: &str,
        subject_id: i64,
    ) -> Result<Value, UpstreamError> {
        self.characteristics_calls.fetch_add(1, Ordering::SeqCst);
        self.secrets_seen.lock().unwrap().push(secret.to_string());
        self.characteristics
            .lock()
            .unwrap()
            .get(&subject_id)
            .cloned()
            .unwrap_or_else(|| Err(UpstreamError::http(404, "subject not found")))
    }

    async fn validate_credential(&self, _secret: &str) -> Result<AccountIdentity, UpstreamError> {
        self.identity
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(UpstreamError::unauthorized()))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn cards(ids: &[&str]) -> Vec<Value> {
    ids.iter()
        .map(|id| json!({"vendorCode": id, "title": format!("Product {id}")}))
        .collect()
}

pub fn page(cards: Vec<Value>) -> CatalogPage {
    CatalogPage {
        cards,
        cursor: json!({"total": 0}),
    }
}

pub fn rows(ids: &[&str]) -> Vec<NewCachedProduct> {
    cards(ids)
        .into_iter()
        .enumerate()
        .filter_map(|(i, card)| NewCachedProduct::from_card(card, i as i32))
        .collect()
}

pub async fn add_account(store: &dyn CredentialStore, name: &str, secret: &str) -> Uuid {
    store
        .insert_credential(&NewAccountCredential {
            name: name.into(),
            environment: "production".into(),
            secret_encrypted: secret.into(),
            seller_id: None,
            seller_name: None,
            trade_mark: None,
        })
        .await
        .unwrap()
        .id
}

/// Put `ids` in place as the account's active generation, refreshed at `at`.
pub async fn seed_products(
    store: &dyn ProductStore,
    account_id: Uuid,
    ids: &[&str],
    at: DateTime<Utc>,
) {
    store
        .replace_account_products(account_id, &rows(ids), at)
        .await
        .unwrap();
}

pub fn product_cache(
    store: Arc<dyn CacheStore>,
    upstream: Arc<StubUpstream>,
    strategy: SyncStrategy,
) -> ProductCache {
    ProductCache::new(
        store,
        upstream,
        Arc::new(PlaintextCipher),
        product_ttl(),
        RetryPolicy::new(2),
        strategy,
    )
}

pub fn single_page() -> SyncStrategy {
    SyncStrategy::SinglePage { page_size: 1000 }
}

// =============================================================================
// Store with injected write failures
// =============================================================================

/// Delegates to a [`MemoryStore`] but rejects the writes it is told to.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    fail_sync_runs: bool,
    fail_swap: bool,
}

impl FaultyStore {
    /// Every sync-run write fails.
    pub fn sync_runs_read_only() -> Self {
        Self {
            fail_sync_runs: true,
            ..Self::default()
        }
    }

    /// Every product swap fails.
    pub fn swap_unavailable() -> Self {
        Self {
            fail_swap: true,
            ..Self::default()
        }
    }

    fn check_sync_runs(&self) -> Result<(), StoreError> {
        if self.fail_sync_runs {
            return Err(StoreError::Unavailable("sync_runs is read-only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for FaultyStore {
    async fn latest_product_refresh(
        &self,
        account_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.inner.latest_product_refresh(account_id).await
    }

    async fn active_products_page(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<ProductPage, StoreError> {
        self.inner.active_products_page(account_id, limit, offset).await
    }

    async fn replace_account_products(
        &self,
        account_id: Uuid,
        rows: &[NewCachedProduct],
        refreshed_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        if self.fail_swap {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner
            .replace_account_products(account_id, rows, refreshed_at)
            .await
    }

    async fn deactivate_products_refreshed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.inner.deactivate_products_refreshed_before(cutoff).await
    }

    async fn purge_inactive_products_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.inner.purge_inactive_products_before(cutoff).await
    }

    async fn product_stats(
        &self,
        account_id: Option<Uuid>,
    ) -> Result<ProductCacheStats, StoreError> {
        self.inner.product_stats(account_id).await
    }
}

#[async_trait]
impl SyncRunStore for FaultyStore {
    async fn start_sync_run(
        &self,
        account_id: Uuid,
        kind: SyncKind,
    ) -> Result<SyncRun, StoreError> {
        self.check_sync_runs()?;
        self.inner.start_sync_run(account_id, kind).await
    }

    async fn finish_sync_run(
        &self,
        run_id: Uuid,
        status: SyncStatus,
        items_synced: i64,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check_sync_runs()?;
        self.inner
            .finish_sync_run(run_id, status, items_synced, error_message)
            .await
    }

    async fn fail_sync_runs_started_before(
        &self,
        cutoff: DateTime<Utc>,
        error_message: &str,
    ) -> Result<u64, StoreError> {
        self.check_sync_runs()?;
        self.inner
            .fail_sync_runs_started_before(cutoff, error_message)
            .await
    }

    async fn get_sync_run(&self, run_id: Uuid) -> Result<Option<SyncRun>, StoreError> {
        self.inner.get_sync_run(run_id).await
    }
}

#[async_trait]
impl CharacteristicsStore for FaultyStore {
    async fn get_characteristics(
        &self,
        subject_id: i64,
    ) -> Result<Option<CachedCharacteristics>, StoreError> {
        self.inner.get_characteristics(subject_id).await
    }

    async fn upsert_characteristics(
        &self,
        subject_id: i64,
        data: &Value,
        refreshed_at: DateTime<Utc>,
    ) -> Result<CachedCharacteristics, StoreError> {
        self.inner
            .upsert_characteristics(subject_id, data, refreshed_at)
            .await
    }

    async fn deactivate_characteristics(&self, subject_id: i64) -> Result<bool, StoreError> {
        self.inner.deactivate_characteristics(subject_id).await
    }

    async fn characteristics_stats(
        &self,
        expired_at: DateTime<Utc>,
    ) -> Result<(i64, i64), StoreError> {
        self.inner.characteristics_stats(expired_at).await
    }
}

#[async_trait]
impl CredentialStore for FaultyStore {
    async fn get_credential(&self, id: Uuid) -> Result<Option<AccountCredential>, StoreError> {
        self.inner.get_credential(id).await
    }

    async fn insert_credential(
        &self,
        credential: &NewAccountCredential,
    ) -> Result<AccountCredential, StoreError> {
        self.inner.insert_credential(credential).await
    }

    async fn list_credentials(&self) -> Result<Vec<AccountCredential>, StoreError> {
        self.inner.list_credentials().await
    }

    async fn set_credential_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<AccountCredential>, StoreError> {
        self.inner.set_credential_active(id, is_active).await
    }
}
