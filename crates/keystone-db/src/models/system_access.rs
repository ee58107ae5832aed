//! System access model: "user U holds permission level P on system S".
//!
//! At most one active row per (user, system) is expected. Nothing in the schema
//! enforces that; reconciliation retires every active row before inserting the
//! replacement set.

use chrono::{DateTime, Utc};
use keystone_core::{status, AuditStamp, PermissionLevelId, SystemId, UserProfileId};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

/// System access entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SystemAccess {
    pub id: i32,
    pub user_id: UserProfileId,
    pub system_id: SystemId,
    pub permission_level_id: PermissionLevelId,
    pub status: i32,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
}

/// Input for inserting a system access row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSystemAccess {
    pub user_id: UserProfileId,
    pub system_id: SystemId,
    pub permission_level_id: PermissionLevelId,
}

impl SystemAccess {
    /// Whether the row has not been retired.
    #[must_use]
    pub fn is_active(&self) -> bool {
        status::is_active(self.status)
    }

    /// Insert an active row stamped with `stamp` as both creator and modifier.
    pub async fn insert<'e, E>(
        executor: E,
        input: &NewSystemAccess,
        stamp: &AuditStamp,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO user_system_access
                (user_id, system_id, permission_level_id, status,
                 created_at, created_by, modified_at, modified_by)
            VALUES ($1, $2, $3, $4, $5, $6, $5, $6)
            RETURNING id, user_id, system_id, permission_level_id, status,
                      created_at, created_by, modified_at, modified_by
            ",
        )
        .bind(input.user_id)
        .bind(input.system_id)
        .bind(input.permission_level_id)
        .bind(status::ACTIVE)
        .bind(stamp.at)
        .bind(&stamp.actor)
        .fetch_one(executor)
        .await
    }

    /// Active rows of one user, oldest first.
    pub async fn list_active_for_user<'e, E>(
        executor: E,
        user_id: UserProfileId,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, user_id, system_id, permission_level_id, status,
                   created_at, created_by, modified_at, modified_by
            FROM user_system_access
            WHERE user_id = $1 AND status >= 0
            ORDER BY id
            ",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Retire every active row of one user. Returns the number of rows retired.
    pub async fn retire_all_for_user<'e, E>(
        executor: E,
        user_id: UserProfileId,
        stamp: &AuditStamp,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE user_system_access
            SET status = $2, modified_at = $3, modified_by = $4
            WHERE user_id = $1 AND status >= 0
            ",
        )
        .bind(user_id)
        .bind(status::RETIRED)
        .bind(stamp.at)
        .bind(&stamp.actor)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
