//! CLI error types and exit codes.

use keystone_access::AccessError;
use keystone_db::DbError;
use thiserror::Error;

use crate::config::ConfigError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 3: Database unreachable
/// - 4: Rejected input (validation, conflict, not found)
/// - 130: Cancelled
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Io(_) => 1,
            CliError::Database(e) if e.is_connection_error() => 3,
            CliError::Access(AccessError::Storage(e)) if e.is_connection_error() => 3,
            CliError::Database(_) | CliError::Access(AccessError::Storage(_)) => 1,
            CliError::Access(AccessError::Cancelled) => 130,
            CliError::Access(_) | CliError::Input(_) | CliError::NotFound(_) => 4,
        }
    }

    /// Print the error to stderr, with one line per validation violation.
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }

        if let CliError::Access(err) = self {
            for violation in err.violations() {
                eprintln!("  - {violation} [{}]", violation.code);
            }
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {suggestion}");
            } else {
                eprintln!("\nSuggestion: {suggestion}");
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(ConfigError::MissingVar(_)) => {
                Some("Set DATABASE_URL in the environment or in a .env file.")
            }
            CliError::Database(DbError::MigrationFailed(_)) => {
                Some("Check that the database user may create tables.")
            }
            CliError::Database(e) if e.is_connection_error() => {
                Some("Check DATABASE_URL and that PostgreSQL is reachable.")
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Input(format!("JSON error: {e}"))
    }
}
