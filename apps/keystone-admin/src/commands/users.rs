//! `users`: list, inspect, create, update and soft-delete users.
//!
//! Writes read their request body from a JSON file shaped like
//! `CreateUserRequest` / `UpdateUserRequest`.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use keystone_access::{
    CreateUserRequest, PermissionRow, UpdateUserRequest, UserPermissionMatrix, UserSummary,
};
use keystone_core::UserProfileId;
use serde::de::DeserializeOwned;

use super::AppContext;
use crate::error::{CliError, CliResult};
use crate::output::{print_json, print_rule, truncate};

/// User management commands
#[derive(Args, Debug)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommands,
}

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// List active users
    List(OutputArgs),

    /// Show one active user
    Show(IdArgs),

    /// Show a user's grant matrix, or the blank matrix when no id is given
    Matrix(MatrixArgs),

    /// Create a user from a JSON request file
    Create(CreateArgs),

    /// Replace a user's grants (and optionally profile) from a JSON request file
    Update(UpdateArgs),

    /// Soft-delete a user and retire their grants
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    pub id: UserProfileId,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct MatrixArgs {
    pub id: Option<UserProfileId>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Path to a JSON `{ "profile": {...}, "permissions": [...] }` document
    #[arg(long, short)]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: UserProfileId,

    /// Path to a JSON `{ "profile": {...}?, "permissions": [...] }` document
    #[arg(long, short)]
    pub file: PathBuf,

    /// Output the reconciliation summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: UserProfileId,
}

/// Execute user commands
pub async fn execute(ctx: &AppContext, args: UsersArgs) -> CliResult<()> {
    match args.command {
        UsersCommands::List(a) => execute_list(ctx, a).await,
        UsersCommands::Show(a) => execute_show(ctx, a).await,
        UsersCommands::Matrix(a) => execute_matrix(ctx, a).await,
        UsersCommands::Create(a) => execute_create(ctx, a).await,
        UsersCommands::Update(a) => execute_update(ctx, a).await,
        UsersCommands::Delete(a) => execute_delete(ctx, a).await,
    }
}

async fn execute_list(ctx: &AppContext, args: OutputArgs) -> CliResult<()> {
    let users = ctx.service.list(&ctx.cancel).await?;

    if args.json {
        print_json(&users)?;
    } else if users.is_empty() {
        println!("No active users.");
    } else {
        print_user_table(&users);
        println!();
        println!("{} active user(s)", users.len());
    }

    Ok(())
}

async fn execute_show(ctx: &AppContext, args: IdArgs) -> CliResult<()> {
    let user = ctx
        .service
        .get(args.id, &ctx.cancel)
        .await?
        .ok_or_else(|| CliError::NotFound(format!("active user {}", args.id)))?;

    if args.json {
        return print_json(&user);
    }

    println!("ID:          {}", user.id);
    println!("Login:       {}", user.login());
    println!("Name:        {} {}", user.first_name, user.last_name);
    println!(
        "Email:       {}",
        if user.email.is_empty() { "-" } else { user.email.as_str() }
    );
    println!("Admin:       {}", if user.is_admin { "yes" } else { "no" });
    if let Some(operator_id) = user.operator_id {
        println!("Operator ID: {operator_id}");
    }
    println!("Created:     {}", user.created_at.to_rfc3339());
    if let Some(modified_at) = user.modified_at {
        println!("Modified:    {}", modified_at.to_rfc3339());
    }

    Ok(())
}

async fn execute_matrix(ctx: &AppContext, args: MatrixArgs) -> CliResult<()> {
    let matrix = match args.id {
        Some(id) => ctx.service.edit_matrix(id, &ctx.cancel).await?,
        None => ctx.service.blank_matrix(&ctx.cancel).await?,
    };

    if args.json {
        return print_json(&matrix);
    }

    print_matrix(&matrix);
    Ok(())
}

async fn execute_create(ctx: &AppContext, args: CreateArgs) -> CliResult<()> {
    let request: CreateUserRequest = read_request(&args.file)?;
    let id = ctx
        .service
        .create(request, &ctx.stamp(), &ctx.cancel)
        .await?;

    println!("Created user {id}");
    Ok(())
}

async fn execute_update(ctx: &AppContext, args: UpdateArgs) -> CliResult<()> {
    let request: UpdateUserRequest = read_request(&args.file)?;
    let summary = ctx
        .service
        .update(args.id, request, &ctx.stamp(), &ctx.cancel)
        .await?;

    if args.json {
        return print_json(&summary);
    }

    println!(
        "Updated user {}: retired {} access / {} branch rows, inserted {} access / {} branch rows",
        args.id,
        summary.system_access_retired,
        summary.branch_grants_retired,
        summary.system_access_inserted,
        summary.branch_grants_inserted
    );
    Ok(())
}

async fn execute_delete(ctx: &AppContext, args: DeleteArgs) -> CliResult<()> {
    if ctx
        .service
        .soft_delete(args.id, &ctx.stamp(), &ctx.cancel)
        .await?
    {
        println!("Deleted user {}", args.id);
    } else {
        println!("User {} is not active; nothing to do.", args.id);
    }
    Ok(())
}

fn read_request<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let body = std::fs::read_to_string(path)
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&body)
        .map_err(|e| CliError::Input(format!("{}: {e}", path.display())))
}

fn print_user_table(users: &[UserSummary]) {
    println!(
        "{:<8} {:<30} {:<30} {:<30} {:<5}",
        "ID", "LOGIN", "NAME", "EMAIL", "ADMIN"
    );
    print_rule(107);

    for user in users {
        let name = format!("{} {}", user.first_name, user.last_name);
        println!(
            "{:<8} {:<30} {:<30} {:<30} {:<5}",
            user.id,
            truncate(&user.login(), 28),
            truncate(&name, 28),
            truncate(&user.email, 28),
            if user.is_admin { "yes" } else { "" }
        );
    }
}

fn selected_level_name(row: &PermissionRow) -> String {
    row.selected_permission_level_id
        .and_then(|id| row.permission_levels.iter().find(|level| level.id == id))
        .map_or_else(|| "-".to_string(), |level| level.name.clone())
}

fn print_matrix(matrix: &UserPermissionMatrix) {
    if let Some(user) = &matrix.user {
        println!("{}\\{} ({} {})", user.domain, user.username, user.first_name, user.last_name);
        println!();
    }

    println!("{:<8} {:<30} {:<20} BRANCHES", "ID", "SYSTEM", "LEVEL");
    print_rule(90);
    for row in &matrix.rows {
        let branches: Vec<&str> = row.checked_branches().map(|code| code.as_str()).collect();
        println!(
            "{:<8} {:<30} {:<20} {}",
            row.system_id,
            truncate(&row.system_name, 28),
            truncate(&selected_level_name(row), 18),
            if branches.is_empty() {
                "-".to_string()
            } else {
                branches.join(", ")
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_access::{BranchCheck, LevelOption};
    use keystone_core::{BranchCode, PermissionLevelId, SystemId};
    use std::collections::BTreeMap;

    #[test]
    fn test_selected_level_name() {
        let mut branches = BTreeMap::new();
        branches.insert(
            BranchCode::new("NY"),
            BranchCheck {
                name: "New York".to_string(),
                checked: true,
            },
        );
        let mut row = PermissionRow {
            system_id: SystemId::new(1),
            system_name: "S1".to_string(),
            branches,
            permission_levels: vec![LevelOption {
                id: PermissionLevelId::new(2),
                name: "Editor".to_string(),
            }],
            selected_permission_level_id: Some(PermissionLevelId::new(2)),
        };
        assert_eq!(selected_level_name(&row), "Editor");

        row.selected_permission_level_id = None;
        assert_eq!(selected_level_name(&row), "-");
    }

    #[test]
    fn test_read_request_reports_path_on_bad_json() {
        let path = std::env::temp_dir().join(format!(
            "keystone-admin-bad-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_request::<UpdateUserRequest>(&path).unwrap_err();
        assert!(matches!(err, CliError::Input(ref msg) if msg.contains("keystone-admin-bad")));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_read_request_missing_file() {
        let err = read_request::<CreateUserRequest>(Path::new("/nonexistent/keystone.json"))
            .unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
