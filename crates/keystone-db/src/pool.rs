//! Connection pool wrapper.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// Pool sizing and connection timeouts.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// How long to wait for a connection before failing.
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// PostgreSQL connection pool used by every keystone store.
#[derive(Debug, Clone)]
pub struct DbPool {
    inner: PgPool,
}

impl DbPool {
    /// Connect to `database_url` with the given settings.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailed` if no connection can be established.
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<Self, DbError> {
        let inner = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        tracing::info!(
            max_connections = settings.max_connections,
            "Database pool connected"
        );

        Ok(Self { inner })
    }

    /// The underlying sqlx pool.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.inner
    }
}
