//! Database migration support.
//!
//! Embeds and runs the SQL migrations from `shelfsync_core/migrations/`:
//! account credentials, the product cache with its sync-run audit log, the
//! global characteristics cache, and the index behind the expiry sweep.

use sqlx::PgPool;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
