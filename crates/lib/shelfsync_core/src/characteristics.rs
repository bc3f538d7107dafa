//! Global subject characteristics cache.
//!
//! One row per subject, shared by every account. The credential passed to a
//! read is only used to authenticate a refresh; whether the cached row is
//! served never depends on it.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::credentials::{Cipher, resolve_secret};
use crate::envelope::Served;
use crate::error::CacheError;
use crate::models::{CachedCharacteristics, CharacteristicsCacheStats};
use crate::retry::RetryPolicy;
use crate::store::CacheStore;
use crate::ttl;
use crate::upstream::UpstreamClient;

/// A subject's characteristics as served to a caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectCharacteristics {
    pub subject_id: i64,
    pub data: Value,
    pub from_cache: bool,
    pub refreshed_at: DateTime<Utc>,
    pub cache_generation: i64,
}

impl SubjectCharacteristics {
    fn from_row(row: CachedCharacteristics, from_cache: bool) -> Self {
        Self {
            subject_id: row.subject_id,
            data: row.data,
            from_cache,
            refreshed_at: row.last_refreshed_at,
            cache_generation: row.cache_generation,
        }
    }
}

/// Characteristics cache engine.
#[derive(Clone)]
pub struct CharacteristicsCache {
    store: Arc<dyn CacheStore>,
    upstream: Arc<dyn UpstreamClient>,
    cipher: Arc<dyn Cipher>,
    ttl: TimeDelta,
    retry: RetryPolicy,
}

impl CharacteristicsCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        upstream: Arc<dyn UpstreamClient>,
        cipher: Arc<dyn Cipher>,
        ttl: TimeDelta,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            upstream,
            cipher,
            ttl,
            retry,
        }
    }

    pub async fn get_subject_characteristics(
        &self,
        credential_id: Uuid,
        subject_id: i64,
        force_refresh: bool,
    ) -> Result<Served<SubjectCharacteristics>, CacheError> {
        let cached = match self.store.get_characteristics(subject_id).await {
            Ok(row) => row.filter(|row| row.active),
            Err(err) => {
                warn!(subject_id, error = %err, "characteristics cache read failed");
                None
            }
        };

        if !force_refresh
            && let Some(row) = &cached
            && ttl::is_fresh(row.last_refreshed_at, Utc::now(), self.ttl)
        {
            debug!(subject_id, "serving characteristics from cache");
            return Ok(Served::fresh(SubjectCharacteristics::from_row(
                row.clone(),
                true,
            )));
        }

        match self.refresh(credential_id, subject_id).await {
            Ok(row) => Ok(Served::fresh(SubjectCharacteristics::from_row(row, false))),
            Err(err @ CacheError::Persistence(_)) => Err(err),
            Err(err) => match cached {
                Some(row) => {
                    warn!(
                        subject_id,
                        error = %err,
                        "refresh failed, serving stale characteristics"
                    );
                    Ok(Served::with_warning(
                        SubjectCharacteristics::from_row(row, true),
                        format!("Using stale cache data due to sync failure: {err}"),
                    ))
                }
                None => Err(err),
            },
        }
    }

    /// Deactivate the subject's row. Repeating it is harmless.
    pub async fn invalidate_cache(&self, subject_id: i64) -> Result<(), CacheError> {
        if self.store.deactivate_characteristics(subject_id).await? {
            info!(subject_id, "characteristics cache invalidated");
            Ok(())
        } else {
            Err(CacheError::NotFound(format!(
                "No cached characteristics for subject {subject_id}"
            )))
        }
    }

    pub async fn get_cache_stats(&self) -> Result<CharacteristicsCacheStats, CacheError> {
        let expired_at = ttl::expiry_cutoff(Utc::now(), self.ttl);
        let (total, expired) = self.store.characteristics_stats(expired_at).await?;
        Ok(CharacteristicsCacheStats {
            total_cached_subjects: total,
            expired_entries: expired,
            valid_entries: total - expired,
            cache_ttl_days: self.ttl.num_days(),
        })
    }

    async fn refresh(
        &self,
        credential_id: Uuid,
        subject_id: i64,
    ) -> Result<CachedCharacteristics, CacheError> {
        let secret =
            resolve_secret(self.store.as_ref(), self.cipher.as_ref(), credential_id).await?;
        let data = self
            .retry
            .run("subject characteristics", || {
                self.upstream
                    .fetch_subject_characteristics(&secret, subject_id)
            })
            .await?;

        let row = self
            .store
            .upsert_characteristics(subject_id, &data, Utc::now())
            .await?;
        info!(
            subject_id,
            generation = row.cache_generation,
            "characteristics cached"
        );
        Ok(row)
    }
}
