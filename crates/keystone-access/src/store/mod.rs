//! Storage seams for the access engine.
//!
//! [`CatalogStore`] serves reference data. [`AccessStore`] adds active-only
//! reads and opens [`AccessTransaction`]s, through which every write happens.
//! Two backends are provided: [`InMemoryAccessStore`] for tests and
//! [`PgAccessStore`] for PostgreSQL.

mod memory;
mod postgres;

pub use memory::{FailurePoint, InMemoryAccessStore};
pub use postgres::PgAccessStore;

use keystone_core::{AuditStamp, SystemId, UserProfileId};
use keystone_db::{
    Branch, BranchGrant, DbError, Domain, LocalSystem, NewBranchGrant, NewSystemAccess,
    PermissionLevel, ProfileFields, SystemAccess, UserProfile,
};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, DbError>;

/// Read-only reference data.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// All domains ordered by name.
    async fn list_domains(&self) -> StoreResult<Vec<Domain>>;

    /// All branches ordered by name.
    async fn list_branches(&self) -> StoreResult<Vec<Branch>>;

    /// All systems ordered by name.
    async fn list_systems(&self) -> StoreResult<Vec<LocalSystem>>;

    /// Levels of one system ordered by name.
    async fn list_permission_levels(&self, system_id: SystemId)
        -> StoreResult<Vec<PermissionLevel>>;

    /// Levels of every system, grouped by system and ordered by name.
    async fn list_all_permission_levels(&self) -> StoreResult<Vec<PermissionLevel>>;
}

/// Profile and grant storage.
#[async_trait::async_trait]
pub trait AccessStore: CatalogStore {
    /// Get an active profile by id.
    async fn find_active_profile(&self, id: UserProfileId) -> StoreResult<Option<UserProfile>>;

    /// Active profiles ordered by first name.
    async fn list_active_profiles(&self) -> StoreResult<Vec<UserProfile>>;

    /// Active system access rows of a user, oldest first.
    async fn active_system_access(&self, user_id: UserProfileId)
        -> StoreResult<Vec<SystemAccess>>;

    /// Active branch grants of a user, oldest first.
    async fn active_branch_grants(&self, user_id: UserProfileId)
        -> StoreResult<Vec<BranchGrant>>;

    /// Open a transaction. Dropping it without commit rolls back.
    async fn begin(&self) -> StoreResult<Box<dyn AccessTransaction>>;
}

/// A unit of work over profiles and grants.
#[async_trait::async_trait]
pub trait AccessTransaction: Send {
    async fn find_active_profile(&mut self, id: UserProfileId)
        -> StoreResult<Option<UserProfile>>;

    /// Find an active profile holding `(domain, username)`, ignoring `excluding`.
    async fn find_active_by_domain_username(
        &mut self,
        domain: &str,
        username: &str,
        excluding: Option<UserProfileId>,
    ) -> StoreResult<Option<UserProfile>>;

    /// Find an active profile using `email`, ignoring `excluding`.
    async fn find_active_by_email(
        &mut self,
        email: &str,
        excluding: Option<UserProfileId>,
    ) -> StoreResult<Option<UserProfile>>;

    async fn insert_profile(
        &mut self,
        fields: &ProfileFields,
        stamp: &AuditStamp,
    ) -> StoreResult<UserProfile>;

    /// Overwrite profile fields, or only the modified stamp when `fields` is
    /// `None`. Returns `false` if the profile is not active.
    async fn update_profile(
        &mut self,
        id: UserProfileId,
        fields: Option<&ProfileFields>,
        stamp: &AuditStamp,
    ) -> StoreResult<bool>;

    /// Soft-delete a profile. Returns `false` if it was not active.
    async fn retire_profile(&mut self, id: UserProfileId, stamp: &AuditStamp)
        -> StoreResult<bool>;

    /// Load an active profile and hold it exclusively until the transaction ends.
    async fn lock_profile(&mut self, id: UserProfileId) -> StoreResult<Option<UserProfile>>;

    async fn active_system_access(&mut self, user_id: UserProfileId)
        -> StoreResult<Vec<SystemAccess>>;

    async fn active_branch_grants(&mut self, user_id: UserProfileId)
        -> StoreResult<Vec<BranchGrant>>;

    /// Retire every active grant of a user. Returns
    /// `(system_access_rows, branch_grant_rows)` retired.
    async fn retire_grants(
        &mut self,
        user_id: UserProfileId,
        stamp: &AuditStamp,
    ) -> StoreResult<(u64, u64)>;

    async fn insert_system_access(
        &mut self,
        input: &NewSystemAccess,
        stamp: &AuditStamp,
    ) -> StoreResult<SystemAccess>;

    async fn insert_branch_grant(
        &mut self,
        input: &NewBranchGrant,
        stamp: &AuditStamp,
    ) -> StoreResult<BranchGrant>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
