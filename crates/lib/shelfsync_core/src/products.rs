//! Per-account product cache.
//!
//! Reads are served from the active generation while it is younger than the
//! TTL. Otherwise (or when forced) a full resync fetches the catalog through
//! the retry policy and swaps the account's rows in one store transaction.
//! If the resync fails, any rows still active are served with a warning.
//!
//! Resyncs run on their own task so a caller that gives up does not cancel
//! them, and at most one runs per account at a time.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::credentials::{Cipher, resolve_secret};
use crate::envelope::Served;
use crate::error::CacheError;
use crate::models::{
    CachedProduct, NewCachedProduct, ProductCacheStats, ProductPage, SyncKind, SyncStatus,
};
use crate::retry::RetryPolicy;
use crate::store::CacheStore;
use crate::sync::{
    INTERRUPTED_MESSAGE, SyncReport, SyncStrategy, fetch_catalog, partial_error_text,
};
use crate::ttl;
use crate::upstream::UpstreamClient;

/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Page used by [`ProductCache::sync_products_now`].
pub const DEFAULT_PAGE_LIMIT: i64 = 100;

/// Products returned to a caller, with where they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductListing {
    pub products: Vec<CachedProduct>,
    pub total: i64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// `false` only when this request ran the resync that produced the rows.
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncReport>,
}

impl ProductListing {
    fn new(page: ProductPage, sync: Option<SyncReport>) -> Self {
        Self {
            products: page.products,
            total: page.total,
            last_refreshed_at: page.last_refreshed_at,
            from_cache: sync.is_none(),
            sync,
        }
    }
}

/// Outcome of [`ProductCache::clear_expired_cache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpirySweep {
    /// Active rows deactivated.
    pub cleared: u64,
    /// Inactive rows deleted.
    pub purged: u64,
}

/// Product cache engine. Cheap to clone.
#[derive(Clone)]
pub struct ProductCache {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn CacheStore>,
    upstream: Arc<dyn UpstreamClient>,
    cipher: Arc<dyn Cipher>,
    ttl: TimeDelta,
    retry: RetryPolicy,
    strategy: SyncStrategy,
    /// One entry per account with a resync running or waiting.
    resync_guards: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ProductCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        upstream: Arc<dyn UpstreamClient>,
        cipher: Arc<dyn Cipher>,
        ttl: TimeDelta,
        retry: RetryPolicy,
        strategy: SyncStrategy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                upstream,
                cipher,
                ttl,
                retry,
                strategy,
                resync_guards: DashMap::new(),
            }),
        }
    }

    /// Whether the account's newest active row is younger than the TTL.
    pub async fn is_cache_valid(&self, account_id: Uuid) -> Result<bool, CacheError> {
        let latest = self.inner.store.latest_product_refresh(account_id).await?;
        Ok(latest.is_some_and(|at| ttl::is_fresh(at, Utc::now(), self.inner.ttl)))
    }

    pub async fn get_cached_products(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
        force_refresh: bool,
    ) -> Result<Served<ProductListing>, CacheError> {
        validate_page(limit, offset)?;
        let store = &self.inner.store;

        if !force_refresh {
            match self.is_cache_valid(account_id).await {
                Ok(true) => {
                    debug!(%account_id, "serving products from cache");
                    let page = store.active_products_page(account_id, limit, offset).await?;
                    return Ok(Served::fresh(ProductListing::new(page, None)));
                }
                Ok(false) => {}
                Err(err) => warn!(%account_id, error = %err, "cache validity check failed"),
            }
        }

        match self.resync_in_background(account_id, force_refresh).await {
            Ok(report) => {
                let warning = report.as_ref().and_then(SyncReport::warning);
                let page = store.active_products_page(account_id, limit, offset).await?;
                let listing = ProductListing::new(page, report);
                Ok(match warning {
                    Some(warning) => Served::with_warning(listing, warning),
                    None => Served::fresh(listing),
                })
            }
            Err(err @ CacheError::Persistence(_)) => Err(err),
            Err(err) => self.stale_fallback(account_id, limit, offset, err).await,
        }
    }

    /// Forced refresh of the account, returning the first page.
    pub async fn sync_products_now(
        &self,
        account_id: Uuid,
    ) -> Result<Served<ProductListing>, CacheError> {
        self.get_cached_products(account_id, DEFAULT_PAGE_LIMIT, 0, true)
            .await
    }

    /// Expiry sweep over every account, with a window of twice the TTL.
    ///
    /// Inactive rows past the window are deleted first, then active rows past
    /// it are deactivated. A row expired by this sweep is therefore deleted by
    /// the next one.
    pub async fn clear_expired_cache(&self) -> Result<ExpirySweep, CacheError> {
        let window = self
            .inner
            .ttl
            .checked_mul(2)
            .ok_or_else(|| CacheError::Internal("product TTL too large to sweep".into()))?;
        let cutoff = ttl::expiry_cutoff(Utc::now(), window);
        let store = &self.inner.store;

        let purged = store.purge_inactive_products_before(cutoff).await?;
        let cleared = store.deactivate_products_refreshed_before(cutoff).await?;
        info!(cleared, purged, %cutoff, "expired product cache cleared");
        Ok(ExpirySweep { cleared, purged })
    }

    pub async fn get_cache_stats(
        &self,
        account_id: Option<Uuid>,
    ) -> Result<ProductCacheStats, CacheError> {
        Ok(self.inner.store.product_stats(account_id).await?)
    }

    /// Fail `in_progress` sync runs that started more than `older_than` ago.
    pub async fn recover_interrupted_runs(&self, older_than: TimeDelta) -> Result<u64, CacheError> {
        let cutoff = Utc::now() - older_than;
        let recovered = self
            .inner
            .store
            .fail_sync_runs_started_before(cutoff, INTERRUPTED_MESSAGE)
            .await?;
        if recovered > 0 {
            warn!(recovered, %cutoff, "marked interrupted sync runs as failed");
        }
        Ok(recovered)
    }

    async fn stale_fallback(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
        err: CacheError,
    ) -> Result<Served<ProductListing>, CacheError> {
        let page = match self
            .inner
            .store
            .active_products_page(account_id, limit, offset)
            .await
        {
            Ok(page) if page.total > 0 => page,
            Ok(_) => return Err(err),
            Err(read_err) => {
                warn!(%account_id, error = %read_err, "stale cache read failed");
                return Err(err);
            }
        };
        warn!(%account_id, error = %err, "resync failed, serving stale products");
        Ok(Served::with_warning(
            ProductListing::new(page, None),
            format!("Using stale cache data due to sync failure: {err}"),
        ))
    }

    /// Run the resync on its own task and wait for it. `None` means another
    /// caller's resync finished while this one waited for the account guard.
    async fn resync_in_background(
        &self,
        account_id: Uuid,
        force_refresh: bool,
    ) -> Result<Option<SyncReport>, CacheError> {
        let requested_at = Utc::now();
        let this = self.clone();
        tokio::spawn(async move {
            this.resync_guarded(account_id, requested_at, force_refresh)
                .await
        })
        .await
        .map_err(|e| CacheError::Internal(format!("resync task failed: {e}")))?
    }

    async fn resync_guarded(
        &self,
        account_id: Uuid,
        requested_at: DateTime<Utc>,
        force_refresh: bool,
    ) -> Result<Option<SyncReport>, CacheError> {
        let guards = &self.inner.resync_guards;
        let guard = guards.entry(account_id).or_default().clone();
        let result = {
            let _held = guard.lock().await;
            self.resync_unless_refreshed(account_id, requested_at, force_refresh)
                .await
        };

        // Only the map holds the guard once no caller is waiting on it.
        drop(guard);
        guards.remove_if(&account_id, |_, guard| Arc::strong_count(guard) == 1);
        result
    }

    async fn resync_unless_refreshed(
        &self,
        account_id: Uuid,
        requested_at: DateTime<Utc>,
        force_refresh: bool,
    ) -> Result<Option<SyncReport>, CacheError> {
        if let Ok(Some(latest)) = self.inner.store.latest_product_refresh(account_id).await {
            let fresh = ttl::is_fresh(latest, Utc::now(), self.inner.ttl);
            if latest >= requested_at || (!force_refresh && fresh) {
                debug!(%account_id, "resync finished while waiting, skipping");
                return Ok(None);
            }
        }

        self.resync(account_id).await.map(Some)
    }

    async fn resync(&self, account_id: Uuid) -> Result<SyncReport, CacheError> {
        let inner = &self.inner;
        let run_id = match inner.store.start_sync_run(account_id, SyncKind::Full).await {
            Ok(run) => Some(run.id),
            Err(err) => {
                warn!(%account_id, error = %err, "could not record sync run start");
                None
            }
        };

        let secret =
            match resolve_secret(inner.store.as_ref(), inner.cipher.as_ref(), account_id).await {
                Ok(secret) => secret,
                Err(err) => {
                    warn!(%account_id, error = %err, "product resync has no usable credential");
                    self.finish_run(run_id, SyncStatus::Failed, 0, Some(&err.to_string()))
                        .await;
                    return Err(err);
                }
            };
        info!(%account_id, strategy = inner.strategy.name(), "product resync started");

        let fetched = match fetch_catalog(
            inner.upstream.as_ref(),
            &inner.retry,
            &inner.strategy,
            &secret,
        )
        .await
        {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(%account_id, error = %err, "product resync failed");
                self.finish_run(run_id, SyncStatus::Failed, 0, Some(&err.to_string()))
                    .await;
                return Err(err.into());
            }
        };

        let (rows, skipped, duplicates) = collect_rows(fetched.cards);
        if skipped > 0 {
            warn!(%account_id, skipped, "skipped cards without a product id");
        }
        if duplicates > 0 {
            debug!(%account_id, duplicates, "collapsed repeated product ids");
        }

        let items_synced = rows.len() as i64;
        if rows.is_empty() {
            debug!(%account_id, "upstream returned no usable cards, keeping current generation");
        } else if let Err(err) = inner
            .store
            .replace_account_products(account_id, &rows, Utc::now())
            .await
        {
            warn!(%account_id, error = %err, "product cache swap failed");
            self.finish_run(run_id, SyncStatus::Failed, 0, Some(&err.to_string()))
                .await;
            return Err(err.into());
        }

        let partial_error = fetched.partial.as_ref().map(partial_error_text);
        self.finish_run(
            run_id,
            SyncStatus::Completed,
            items_synced,
            partial_error.as_deref(),
        )
        .await;
        info!(%account_id, items_synced, skipped, "product resync completed");

        Ok(SyncReport {
            run_id,
            status: SyncStatus::Completed,
            items_synced,
            skipped,
            duplicates,
            pages_fetched: fetched.pages_fetched,
            partial_error,
        })
    }

    /// Close the audit row. Failures here never fail the resync.
    async fn finish_run(
        &self,
        run_id: Option<Uuid>,
        status: SyncStatus,
        items_synced: i64,
        error_message: Option<&str>,
    ) {
        let Some(run_id) = run_id else { return };
        if let Err(err) = self
            .inner
            .store
            .finish_sync_run(run_id, status, items_synced, error_message)
            .await
        {
            warn!(%run_id, error = %err, "could not record sync run result");
        }
    }
}

fn validate_page(limit: i64, offset: i64) -> Result<(), CacheError> {
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(CacheError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }
    if offset < 0 {
        return Err(CacheError::Validation("offset must not be negative".into()));
    }
    Ok(())
}

/// Turn cards into rows: `(rows, skipped, duplicates)`. The first card wins
/// for a repeated product id.
fn collect_rows(cards: Vec<Value>) -> (Vec<NewCachedProduct>, usize, usize) {
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(cards.len());
    let (mut skipped, mut duplicates) = (0, 0);

    for (index, card) in cards.into_iter().enumerate() {
        let position = i32::try_from(index).unwrap_or(i32::MAX);
        match NewCachedProduct::from_card(card, position) {
            None => skipped += 1,
            Some(row) if !seen.insert(row.upstream_product_id.clone()) => duplicates += 1,
            Some(row) => rows.push(row),
        }
    }
    (rows, skipped, duplicates)
}
