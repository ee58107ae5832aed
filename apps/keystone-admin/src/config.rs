//! Configuration loaded from environment variables.
//!
//! `DATABASE_URL` is required; everything else has a default. A `.env` file
//! in the working directory is read first if present.

use std::env;
use std::time::Duration;

use keystone_access::{LockPolicy, ReconcileOptions};
use keystone_db::PoolSettings;
use thiserror::Error;

const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_ACTOR: &str = "system";

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// `EnvFilter` directive, e.g. `info,keystone_access=debug`.
    pub log_filter: String,
    pub pool: PoolSettings,
    pub reconcile: ReconcileOptions,
    /// Actor recorded on writes unless overridden on the command line.
    pub actor: String,
}

impl Config {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load using `lookup` to resolve variables. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_filter = get("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => parse_number::<u32>("DB_MAX_CONNECTIONS", &raw)?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                var: "DB_MAX_CONNECTIONS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let connect_timeout = match get("DB_CONNECT_TIMEOUT_SECS") {
            Some(raw) => parse_number::<u64>("DB_CONNECT_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        let lock = match get("RECONCILE_LOCK") {
            Some(raw) => raw
                .parse::<LockPolicy>()
                .map_err(|e| ConfigError::InvalidValue {
                    var: "RECONCILE_LOCK".to_string(),
                    message: e.to_string(),
                })?,
            None => LockPolicy::default(),
        };

        let actor = get("KEYSTONE_ACTOR")
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| DEFAULT_ACTOR.to_string());

        Ok(Self {
            database_url,
            log_filter,
            pool: PoolSettings {
                max_connections,
                acquire_timeout: Duration::from_secs(connect_timeout),
            },
            reconcile: ReconcileOptions { lock },
            actor,
        })
    }
}

fn parse_number<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("'{raw}': {e}"),
        })
}
