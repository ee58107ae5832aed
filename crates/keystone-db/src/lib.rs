//! Database layer for keystone.
//!
//! Provides the PostgreSQL schema (embedded sqlx migrations), row models with
//! executor-generic query functions, and the crate's [`DbError`].
//!
//! Every query function takes any `PgExecutor`, so the same model code runs
//! against a pool or inside an open transaction (`&mut *tx`).

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::{DbError, ACTIVE_DOMAIN_USERNAME_CONSTRAINT, ACTIVE_EMAIL_CONSTRAINT};
pub use migrations::run_migrations;
pub use models::*;
pub use pool::{DbPool, PoolSettings};
