//! `migrate`: apply pending schema migrations.

use keystone_db::{run_migrations, DbPool};

use crate::error::CliResult;

pub async fn execute(pool: &DbPool) -> CliResult<()> {
    run_migrations(pool).await?;
    println!("Database schema is up to date.");
    Ok(())
}
