//! Reference catalog models: domains, branches, local systems and their
//! permission levels.
//!
//! The catalog is read-only from keystone's point of view. Every list query is
//! ordered by name so callers can present it directly.

use keystone_core::{BranchCode, DomainId, PermissionLevelId, SystemId};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

/// Organisational grouping of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Domain {
    pub id: DomainId,
    pub name: String,
}

/// A branch users can be scoped to under a system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Branch {
    pub code: BranchCode,
    pub name: String,
}

/// An application that users are granted into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LocalSystem {
    pub id: SystemId,
    pub name: String,
}

/// A permission level offered by one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PermissionLevel {
    pub id: PermissionLevelId,
    pub system_id: SystemId,
    pub name: String,
}

impl Domain {
    /// All domains ordered by name.
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>("SELECT id, name FROM domains ORDER BY name, id")
            .fetch_all(executor)
            .await
    }
}

impl Branch {
    /// All branches ordered by name.
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>("SELECT TRIM(code) AS code, name FROM branches ORDER BY name, code")
            .fetch_all(executor)
            .await
    }
}

impl LocalSystem {
    /// All systems ordered by name.
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>("SELECT id, name FROM local_systems ORDER BY name, id")
            .fetch_all(executor)
            .await
    }
}

impl PermissionLevel {
    /// Levels of one system ordered by name.
    pub async fn list_for_system<'e, E>(
        executor: E,
        system_id: SystemId,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, system_id, name
            FROM permission_levels
            WHERE system_id = $1
            ORDER BY name, id
            ",
        )
        .bind(system_id)
        .fetch_all(executor)
        .await
    }

    /// Every level of every system, grouped by system and ordered by name.
    pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            "SELECT id, system_id, name FROM permission_levels ORDER BY system_id, name, id",
        )
        .fetch_all(executor)
        .await
    }
}
