//! User profile model.
//!
//! Profiles are the root of a user's grants. They are never deleted: a
//! soft-deleted profile keeps its row with `status = -1`.

use chrono::{DateTime, Utc};
use keystone_core::{status, AuditStamp, UserProfileId};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

const PROFILE_COLUMNS: &str = "id, domain, first_name, last_name, username, email, is_admin, \
     operator_id, status, created_at, created_by, modified_at, modified_by";

/// User profile entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: UserProfileId,
    pub domain: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    /// Optional operator number carried through from the source directory.
    pub operator_id: Option<i32>,
    pub status: i32,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub domain: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub operator_id: Option<i32>,
}

impl ProfileFields {
    /// Trimmed copy with the e-mail address lower-cased.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            domain: self.domain.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            username: self.username.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            is_admin: self.is_admin,
            operator_id: self.operator_id,
        }
    }
}

impl UserProfile {
    /// Whether the profile has not been soft-deleted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        status::is_active(self.status)
    }

    /// The editable fields of this profile.
    #[must_use]
    pub fn fields(&self) -> ProfileFields {
        ProfileFields {
            domain: self.domain.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
            operator_id: self.operator_id,
        }
    }

    /// Insert a new active profile.
    pub async fn insert<'e, E>(
        executor: E,
        fields: &ProfileFields,
        stamp: &AuditStamp,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r"
            INSERT INTO user_profiles
                (domain, first_name, last_name, username, email, is_admin, operator_id,
                 status, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PROFILE_COLUMNS}
            "
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(&fields.domain)
            .bind(&fields.first_name)
            .bind(&fields.last_name)
            .bind(&fields.username)
            .bind(&fields.email)
            .bind(fields.is_admin)
            .bind(fields.operator_id)
            .bind(status::ACTIVE)
            .bind(stamp.at)
            .bind(&stamp.actor)
            .fetch_one(executor)
            .await
    }

    /// Get an active profile by id.
    pub async fn find_active<'e, E>(
        executor: E,
        id: UserProfileId,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE id = $1 AND status >= 0");
        sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Get an active profile by id and hold a row lock until the transaction ends.
    pub async fn lock_active<'e, E>(
        executor: E,
        id: UserProfileId,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE id = $1 AND status >= 0 FOR UPDATE"
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find an active profile holding `(domain, username)`, optionally ignoring one id.
    pub async fn find_active_by_domain_username<'e, E>(
        executor: E,
        domain: &str,
        username: &str,
        excluding: Option<UserProfileId>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r"
            SELECT {PROFILE_COLUMNS}
            FROM user_profiles
            WHERE domain = $1 AND username = $2 AND status >= 0
              AND ($3::INTEGER IS NULL OR id <> $3)
            LIMIT 1
            "
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(domain)
            .bind(username)
            .bind(excluding)
            .fetch_optional(executor)
            .await
    }

    /// Find an active profile using `email`, optionally ignoring one id.
    pub async fn find_active_by_email<'e, E>(
        executor: E,
        email: &str,
        excluding: Option<UserProfileId>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r"
            SELECT {PROFILE_COLUMNS}
            FROM user_profiles
            WHERE email = $1 AND status >= 0
              AND ($2::INTEGER IS NULL OR id <> $2)
            LIMIT 1
            "
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(email)
            .bind(excluding)
            .fetch_optional(executor)
            .await
    }

    /// Active profiles ordered by first name.
    pub async fn list_active<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE status >= 0 ORDER BY first_name, id"
        );
        sqlx::query_as::<_, Self>(&sql).fetch_all(executor).await
    }

    /// Overwrite the editable fields of an active profile.
    ///
    /// Returns `true` if a row was updated.
    pub async fn update_fields<'e, E>(
        executor: E,
        id: UserProfileId,
        fields: &ProfileFields,
        stamp: &AuditStamp,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE user_profiles
            SET domain = $2, first_name = $3, last_name = $4, username = $5, email = $6,
                is_admin = $7, operator_id = $8, modified_at = $9, modified_by = $10
            WHERE id = $1 AND status >= 0
            ",
        )
        .bind(id)
        .bind(&fields.domain)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.username)
        .bind(&fields.email)
        .bind(fields.is_admin)
        .bind(fields.operator_id)
        .bind(stamp.at)
        .bind(&stamp.actor)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a modification without changing any field.
    pub async fn touch<'e, E>(
        executor: E,
        id: UserProfileId,
        stamp: &AuditStamp,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE user_profiles
            SET modified_at = $2, modified_by = $3
            WHERE id = $1 AND status >= 0
            ",
        )
        .bind(id)
        .bind(stamp.at)
        .bind(&stamp.actor)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete an active profile.
    ///
    /// Returns `true` if the profile was active and is now retired.
    pub async fn retire<'e, E>(
        executor: E,
        id: UserProfileId,
        stamp: &AuditStamp,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE user_profiles
            SET status = $2, modified_at = $3, modified_by = $4
            WHERE id = $1 AND status >= 0
            ",
        )
        .bind(id)
        .bind(status::RETIRED)
        .bind(stamp.at)
        .bind(&stamp.actor)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
