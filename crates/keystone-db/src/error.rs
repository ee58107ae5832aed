//! Error types for the keystone-db crate.
//!
//! Provides a unified error type that wraps `SQLx` errors with additional context.

use thiserror::Error;

/// Name of the partial unique index guarding active (domain, username) pairs.
pub const ACTIVE_DOMAIN_USERNAME_CONSTRAINT: &str = "user_profiles_active_domain_username";

/// Name of the partial unique index guarding active e-mail addresses.
pub const ACTIVE_EMAIL_CONSTRAINT: &str = "user_profiles_active_email";

/// Database operation errors.
///
/// # Example
///
/// ```rust
/// use keystone_db::DbError;
///
/// fn handle_error(err: DbError) {
///     match err {
///         DbError::ConnectionFailed(e) => eprintln!("Cannot connect: {}", e),
///         DbError::MigrationFailed(e) => eprintln!("Migration error: {}", e),
///         DbError::QueryFailed(e) => eprintln!("Query error: {}", e),
///         DbError::UniqueViolation { constraint } => eprintln!("Duplicate: {}", constraint),
///         DbError::Unavailable(msg) => eprintln!("Store unavailable: {}", msg),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// An insert or update collided with a unique index.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation {
        /// Name of the violated constraint or index.
        constraint: String,
    },

    /// The storage backend refused the operation for a reason outside SQL.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl DbError {
    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }

    /// Check if this error indicates a migration problem.
    #[must_use]
    pub fn is_migration_error(&self) -> bool {
        matches!(self, DbError::MigrationFailed(_))
    }

    /// Check if this error indicates a query problem.
    #[must_use]
    pub fn is_query_error(&self) -> bool {
        matches!(self, DbError::QueryFailed(_))
    }

    /// The violated constraint, if this is a unique violation.
    #[must_use]
    pub fn unique_constraint(&self) -> Option<&str> {
        match self {
            DbError::UniqueViolation { constraint } => Some(constraint),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                if let Some(constraint) = db_err.constraint() {
                    return DbError::UniqueViolation {
                        constraint: constraint.to_string(),
                    };
                }
            }
        }
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::ConnectionFailed(err)
            }
            other => DbError::QueryFailed(other),
        }
    }
}
