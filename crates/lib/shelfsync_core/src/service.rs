//! Facade exposing both cache engines behind the uniform [`Envelope`].
//!
//! Holds no mutable state beyond configuration; the store, upstream client
//! and cipher are injected once at construction.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::characteristics::{CharacteristicsCache, SubjectCharacteristics};
use crate::config::CacheConfig;
use crate::credentials::{self, Cipher};
use crate::envelope::Envelope;
use crate::error::CacheError;
use crate::models::{AccountCredential, CharacteristicsCacheStats, ProductCacheStats};
use crate::products::{ProductCache, ProductListing};
use crate::store::CacheStore;
use crate::upstream::UpstreamClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearedCount {
    pub cleared_count: u64,
    pub purged_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecoveredCount {
    pub recovered_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Invalidated {
    pub subject_id: i64,
}

#[derive(Clone)]
pub struct CacheService {
    config: CacheConfig,
    store: Arc<dyn CacheStore>,
    upstream: Arc<dyn UpstreamClient>,
    cipher: Arc<dyn Cipher>,
    products: ProductCache,
    characteristics: CharacteristicsCache,
}

impl CacheService {
    pub fn new(
        config: &CacheConfig,
        store: Arc<dyn CacheStore>,
        upstream: Arc<dyn UpstreamClient>,
        cipher: Arc<dyn Cipher>,
    ) -> Self {
        let products = ProductCache::new(
            store.clone(),
            upstream.clone(),
            cipher.clone(),
            config.product_ttl,
            config.retry,
            config.sync_strategy,
        );
        let characteristics = CharacteristicsCache::new(
            store.clone(),
            upstream.clone(),
            cipher.clone(),
            config.characteristics_ttl,
            config.retry,
        );
        Self {
            config: config.clone(),
            store,
            upstream,
            cipher,
            products,
            characteristics,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    pub async fn get_cached_products(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
        force_refresh: bool,
    ) -> Envelope<ProductListing> {
        Envelope::from_served(
            self.products
                .get_cached_products(account_id, limit, offset, force_refresh)
                .await,
        )
    }

    pub async fn sync_products_now(&self, account_id: Uuid) -> Envelope<ProductListing> {
        Envelope::from_served(self.products.sync_products_now(account_id).await)
    }

    pub async fn get_product_cache_stats(
        &self,
        account_id: Option<Uuid>,
    ) -> Envelope<ProductCacheStats> {
        Envelope::from_result(self.products.get_cache_stats(account_id).await)
    }

    pub async fn clear_expired_product_cache(&self) -> Envelope<ClearedCount> {
        Envelope::from_result(
            self.products
                .clear_expired_cache()
                .await
                .map(|sweep| ClearedCount {
                    cleared_count: sweep.cleared,
                    purged_count: sweep.purged,
                }),
        )
    }

    /// Fail sync runs left `in_progress` longer than the configured window.
    pub async fn recover_interrupted_runs(&self) -> Envelope<RecoveredCount> {
        Envelope::from_result(
            self.products
                .recover_interrupted_runs(self.config.stale_run_after)
                .await
                .map(|recovered_count| RecoveredCount { recovered_count }),
        )
    }

    // -------------------------------------------------------------------------
    // Characteristics
    // -------------------------------------------------------------------------

    pub async fn get_subject_characteristics(
        &self,
        credential_id: Uuid,
        subject_id: i64,
        force_refresh: bool,
    ) -> Envelope<SubjectCharacteristics> {
        Envelope::from_served(
            self.characteristics
                .get_subject_characteristics(credential_id, subject_id, force_refresh)
                .await,
        )
    }

    pub async fn invalidate_subject_characteristics_cache(
        &self,
        subject_id: i64,
    ) -> Envelope<Invalidated> {
        Envelope::from_result(
            self.characteristics
                .invalidate_cache(subject_id)
                .await
                .map(|()| Invalidated { subject_id }),
        )
    }

    pub async fn get_characteristics_cache_stats(&self) -> Envelope<CharacteristicsCacheStats> {
        Envelope::from_result(self.characteristics.get_cache_stats().await)
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    pub async fn register_account(
        &self,
        name: &str,
        environment: Option<&str>,
        secret: &str,
    ) -> Envelope<AccountCredential> {
        Envelope::from_result(
            credentials::register_account(
                self.store.as_ref(),
                self.upstream.as_ref(),
                self.cipher.as_ref(),
                name,
                environment,
                secret,
            )
            .await,
        )
    }

    pub async fn list_accounts(&self) -> Envelope<Vec<AccountCredential>> {
        Envelope::from_result(
            self.store
                .list_credentials()
                .await
                .map_err(CacheError::from),
        )
    }

    pub async fn set_account_active(
        &self,
        account_id: Uuid,
        is_active: bool,
    ) -> Envelope<AccountCredential> {
        let result = match self.store.set_credential_active(account_id, is_active).await {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(CacheError::NotFound(format!(
                "Account {account_id} not found"
            ))),
            Err(err) => Err(err.into()),
        };
        Envelope::from_result(result)
    }
}
