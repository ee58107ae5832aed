//! Branch grant model: "user U is scoped to branch B under system S".
//!
//! Zero or more active rows per (user, system).

use chrono::{DateTime, Utc};
use keystone_core::{status, AuditStamp, BranchCode, SystemId, UserProfileId};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

/// Branch grant entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BranchGrant {
    pub id: i32,
    pub user_id: UserProfileId,
    pub system_id: SystemId,
    pub branch_code: BranchCode,
    pub status: i32,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
}

/// Input for inserting a branch grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBranchGrant {
    pub user_id: UserProfileId,
    pub system_id: SystemId,
    pub branch_code: BranchCode,
}

impl BranchGrant {
    /// Whether the row has not been retired.
    #[must_use]
    pub fn is_active(&self) -> bool {
        status::is_active(self.status)
    }

    /// Insert an active row stamped with `stamp` as both creator and modifier.
    pub async fn insert<'e, E>(
        executor: E,
        input: &NewBranchGrant,
        stamp: &AuditStamp,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO user_system_branches
                (user_id, system_id, branch_code, status,
                 created_at, created_by, modified_at, modified_by)
            VALUES ($1, $2, $3, $4, $5, $6, $5, $6)
            RETURNING id, user_id, system_id, branch_code, status,
                      created_at, created_by, modified_at, modified_by
            ",
        )
        .bind(input.user_id)
        .bind(input.system_id)
        .bind(&input.branch_code)
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
            SELECT id, user_id, system_id, TRIM(branch_code) AS branch_code, status,
                   created_at, created_by, modified_at, modified_by
            FROM user_system_branches
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
            UPDATE user_system_branches
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
