//! keystone-admin - operator CLI for keystone
//!
//! Applies migrations, prints the reference catalog, and administers users and
//! their grant matrices against the configured PostgreSQL database.

use clap::{Parser, Subcommand};
use keystone_db::DbPool;
use tokio_util::sync::CancellationToken;

mod commands;
mod config;
mod error;
mod logging;
mod output;

use commands::AppContext;
use config::Config;
use error::CliResult;

/// keystone-admin - user and grant administration
#[derive(Parser)]
#[command(name = "keystone-admin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Acting user recorded on writes (defaults to KEYSTONE_ACTOR)
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Show domains, branches, systems and permission levels
    Catalog(commands::catalog::CatalogArgs),

    /// Manage users and their grants
    Users(commands::users::UsersArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = Config::from_env()?;
    logging::init_logging(&config.log_filter);

    let pool = DbPool::connect(&config.database_url, &config.pool).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Migrate => commands::migrate::execute(&pool).await,
        Commands::Catalog(args) => {
            let ctx = AppContext::new(pool, &config, cli.actor, cancel);
            commands::catalog::execute(&ctx, args).await
        }
        Commands::Users(args) => {
            let ctx = AppContext::new(pool, &config, cli.actor, cancel);
            commands::users::execute(&ctx, args).await
        }
    }
}
