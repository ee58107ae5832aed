//! `catalog`: print domains, branches, systems and their permission levels.

use clap::Args;
use keystone_db::{Branch, Domain, LocalSystem, PermissionLevel};
use serde::Serialize;

use super::AppContext;
use crate::error::CliResult;
use crate::output::{print_json, print_rule, truncate};

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct SystemEntry {
    #[serde(flatten)]
    system: LocalSystem,
    permission_levels: Vec<PermissionLevel>,
}

#[derive(Serialize)]
struct CatalogView {
    domains: Vec<Domain>,
    branches: Vec<Branch>,
    systems: Vec<SystemEntry>,
}

pub async fn execute(ctx: &AppContext, args: CatalogArgs) -> CliResult<()> {
    let catalog = ctx.service.catalog();

    let mut systems = Vec::new();
    for system in catalog.list_systems().await? {
        let permission_levels = catalog.list_permission_levels(system.id).await?;
        systems.push(SystemEntry {
            system,
            permission_levels,
        });
    }
    let view = CatalogView {
        domains: catalog.list_domains().await?,
        branches: catalog.list_branches().await?,
        systems,
    };

    if args.json {
        return print_json(&view);
    }

    println!("Domains:");
    for domain in &view.domains {
        println!("  {:<6} {}", domain.id, domain.name);
    }

    println!("\nBranches:");
    for branch in &view.branches {
        println!("  {:<20} {}", branch.code, truncate(&branch.name, 40));
    }

    println!("\n{:<8} {:<30} PERMISSION LEVELS", "ID", "SYSTEM");
    print_rule(80);
    for entry in &view.systems {
        let levels: Vec<String> = entry
            .permission_levels
            .iter()
            .map(|level| format!("{} ({})", level.name, level.id))
            .collect();
        println!(
            "{:<8} {:<30} {}",
            entry.system.id,
            truncate(&entry.system.name, 28),
            levels.join(", ")
        );
    }

    Ok(())
}
