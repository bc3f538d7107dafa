//! Characteristics cache models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Database row for `cached_characteristics`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CachedCharacteristics {
    pub subject_id: i64,
    pub data: Value,
    pub last_refreshed_at: DateTime<Utc>,
    pub cache_generation: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CharacteristicsCacheStats {
    pub total_cached_subjects: i64,
    /// Active rows past TTL that no sweep has deactivated yet.
    pub expired_entries: i64,
    pub valid_entries: i64,
    pub cache_ttl_days: i64,
}
