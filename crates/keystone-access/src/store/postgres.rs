//! PostgreSQL access store over the `keystone-db` models.

use keystone_core::{AuditStamp, SystemId, UserProfileId};
use keystone_db::{
    Branch, BranchGrant, DbPool, Domain, LocalSystem, NewBranchGrant, NewSystemAccess,
    PermissionLevel, ProfileFields, SystemAccess, UserProfile,
};
use sqlx::{Postgres, Transaction};

use super::{AccessStore, AccessTransaction, CatalogStore, StoreResult};

/// [`AccessStore`] backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgAccessStore {
    pool: DbPool,
}

impl PgAccessStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgAccessStore {
    async fn list_domains(&self) -> StoreResult<Vec<Domain>> {
        Ok(Domain::list(self.pool.inner()).await?)
    }

    async fn list_branches(&self) -> StoreResult<Vec<Branch>> {
        Ok(Branch::list(self.pool.inner()).await?)
    }

    async fn list_systems(&self) -> StoreResult<Vec<LocalSystem>> {
        Ok(LocalSystem::list(self.pool.inner()).await?)
    }

    async fn list_permission_levels(
        &self,
        system_id: SystemId,
    ) -> StoreResult<Vec<PermissionLevel>> {
        Ok(PermissionLevel::list_for_system(self.pool.inner(), system_id).await?)
    }

    async fn list_all_permission_levels(&self) -> StoreResult<Vec<PermissionLevel>> {
        Ok(PermissionLevel::list_all(self.pool.inner()).await?)
    }
}

#[async_trait::async_trait]
impl AccessStore for PgAccessStore {
    async fn find_active_profile(&self, id: UserProfileId) -> StoreResult<Option<UserProfile>> {
        Ok(UserProfile::find_active(self.pool.inner(), id).await?)
    }

    async fn list_active_profiles(&self) -> StoreResult<Vec<UserProfile>> {
        Ok(UserProfile::list_active(self.pool.inner()).await?)
    }

    async fn active_system_access(
        &self,
        user_id: UserProfileId,
    ) -> StoreResult<Vec<SystemAccess>> {
        Ok(SystemAccess::list_active_for_user(self.pool.inner(), user_id).await?)
    }

    async fn active_branch_grants(
        &self,
        user_id: UserProfileId,
    ) -> StoreResult<Vec<BranchGrant>> {
        Ok(BranchGrant::list_active_for_user(self.pool.inner(), user_id).await?)
    }

    async fn begin(&self) -> StoreResult<Box<dyn AccessTransaction>> {
        let tx = self.pool.inner().begin().await?;
        Ok(Box::new(PgAccessTransaction { tx }))
    }
}

/// Open transaction on one pooled connection. sqlx rolls back on drop.
struct PgAccessTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl AccessTransaction for PgAccessTransaction {
    async fn find_active_profile(
        &mut self,
        id: UserProfileId,
    ) -> StoreResult<Option<UserProfile>> {
        Ok(UserProfile::find_active(&mut *self.tx, id).await?)
    }

    async fn find_active_by_domain_username(
        &mut self,
        domain: &str,
        username: &str,
        excluding: Option<UserProfileId>,
    ) -> StoreResult<Option<UserProfile>> {
        Ok(
            UserProfile::find_active_by_domain_username(&mut *self.tx, domain, username, excluding)
                .await?,
        )
    }

    async fn find_active_by_email(
        &mut self,
        email: &str,
        excluding: Option<UserProfileId>,
    ) -> StoreResult<Option<UserProfile>> {
        Ok(UserProfile::find_active_by_email(&mut *self.tx, email, excluding).await?)
    }

    async fn insert_profile(
        &mut self,
        fields: &ProfileFields,
        stamp: &AuditStamp,
    ) -> StoreResult<UserProfile> {
        Ok(UserProfile::insert(&mut *self.tx, fields, stamp).await?)
    }

    async fn update_profile(
        &mut self,
        id: UserProfileId,
        fields: Option<&ProfileFields>,
        stamp: &AuditStamp,
    ) -> StoreResult<bool> {
        let updated = match fields {
            Some(fields) => UserProfile::update_fields(&mut *self.tx, id, fields, stamp).await?,
            None => UserProfile::touch(&mut *self.tx, id, stamp).await?,
        };
        Ok(updated)
    }

    async fn retire_profile(
        &mut self,
        id: UserProfileId,
        stamp: &AuditStamp,
    ) -> StoreResult<bool> {
        Ok(UserProfile::retire(&mut *self.tx, id, stamp).await?)
    }

    async fn lock_profile(&mut self, id: UserProfileId) -> StoreResult<Option<UserProfile>> {
        Ok(UserProfile::lock_active(&mut *self.tx, id).await?)
    }

    async fn active_system_access(
        &mut self,
        user_id: UserProfileId,
    ) -> StoreResult<Vec<SystemAccess>> {
        Ok(SystemAccess::list_active_for_user(&mut *self.tx, user_id).await?)
    }

    async fn active_branch_grants(
        &mut self,
        user_id: UserProfileId,
    ) -> StoreResult<Vec<BranchGrant>> {
        Ok(BranchGrant::list_active_for_user(&mut *self.tx, user_id).await?)
    }

    async fn retire_grants(
        &mut self,
        user_id: UserProfileId,
        stamp: &AuditStamp,
    ) -> StoreResult<(u64, u64)> {
        let access = SystemAccess::retire_all_for_user(&mut *self.tx, user_id, stamp).await?;
        let grants = BranchGrant::retire_all_for_user(&mut *self.tx, user_id, stamp).await?;
        Ok((access, grants))
    }

    async fn insert_system_access(
        &mut self,
        input: &NewSystemAccess,
        stamp: &AuditStamp,
    ) -> StoreResult<SystemAccess> {
        Ok(SystemAccess::insert(&mut *self.tx, input, stamp).await?)
    }

    async fn insert_branch_grant(
        &mut self,
        input: &NewBranchGrant,
        stamp: &AuditStamp,
    ) -> StoreResult<BranchGrant> {
        Ok(BranchGrant::insert(&mut *self.tx, input, stamp).await?)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let PgAccessTransaction { tx } = *self;
        Ok(tx.commit().await?)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let PgAccessTransaction { tx } = *self;
        Ok(tx.rollback().await?)
    }
}
