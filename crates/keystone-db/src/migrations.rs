//! Database migration management.
//!
//! Provides functions to run the versioned SQL migrations embedded from
//! `migrations/`.

use crate::error::DbError;
use crate::pool::DbPool;

/// Run all pending database migrations.
///
/// Migrations are embedded at compile time from the `migrations/` directory and
/// applied in filename order.
///
/// # Example
///
/// ```rust,ignore
/// use keystone_db::{DbPool, PoolSettings, run_migrations};
///
/// let pool = DbPool::connect("postgres://localhost/keystone", &PoolSettings::default()).await?;
/// run_migrations(&pool).await?;
/// ```
///
/// # Errors
///
/// Returns `DbError::MigrationFailed` if any migration fails to apply.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool.inner())
        .await
        .map_err(DbError::MigrationFailed)?;

    tracing::info!("Migrations completed successfully");
    Ok(())
}
