//! In-memory access store for testing.
//!
//! Transactions take the store's single lock for their whole lifetime, so they
//! are fully serialized. Writes go straight to the shared state; a snapshot
//! taken at `begin` is restored on rollback, on drop without commit, or when an
//! injected failure fires during commit.
//!
//! Store-level reads wait for an open transaction to finish. Callers holding a
//! transaction must read through it.

use std::collections::BTreeMap;
use std::sync::Arc;

use keystone_core::{
    status, AuditStamp, BranchCode, DomainId, PermissionLevelId, SystemId, UserProfileId,
};
use keystone_db::{
    Branch, BranchGrant, DbError, Domain, LocalSystem, NewBranchGrant, NewSystemAccess,
    PermissionLevel, ProfileFields, SystemAccess, UserProfile, ACTIVE_DOMAIN_USERNAME_CONSTRAINT,
    ACTIVE_EMAIL_CONSTRAINT,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{AccessStore, AccessTransaction, CatalogStore, StoreResult};

/// A transaction step that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    RetireGrants,
    InsertSystemAccess,
    InsertBranchGrant,
    UpdateProfile,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    domains: Vec<Domain>,
    branches: Vec<Branch>,
    systems: Vec<LocalSystem>,
    levels: Vec<PermissionLevel>,
    profiles: BTreeMap<UserProfileId, UserProfile>,
    system_access: Vec<SystemAccess>,
    branch_grants: Vec<BranchGrant>,
    last_profile_id: i32,
    last_access_id: i32,
    last_grant_id: i32,
}

impl MemoryState {
    fn active_profile(&self, id: UserProfileId) -> Option<&UserProfile> {
        self.profiles.get(&id).filter(|p| p.is_active())
    }

    fn active_profiles_sorted(&self) -> Vec<UserProfile> {
        let mut profiles: Vec<_> = self
            .profiles
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.first_name.cmp(&b.first_name).then(a.id.cmp(&b.id)));
        profiles
    }

    fn active_access_for(&self, user_id: UserProfileId) -> Vec<SystemAccess> {
        self.system_access
            .iter()
            .filter(|row| row.user_id == user_id && row.is_active())
            .cloned()
            .collect()
    }

    fn active_grants_for(&self, user_id: UserProfileId) -> Vec<BranchGrant> {
        self.branch_grants
            .iter()
            .filter(|row| row.user_id == user_id && row.is_active())
            .cloned()
            .collect()
    }

    fn by_domain_username(
        &self,
        domain: &str,
        username: &str,
        excluding: Option<UserProfileId>,
    ) -> Option<&UserProfile> {
        self.profiles.values().find(|p| {
            p.is_active()
                && p.domain == domain
                && p.username == username
                && Some(p.id) != excluding
        })
    }

    fn by_email(&self, email: &str, excluding: Option<UserProfileId>) -> Option<&UserProfile> {
        self.profiles
            .values()
            .find(|p| p.is_active() && p.email == email && Some(p.id) != excluding)
    }

    /// Mirror of the partial unique indexes on `user_profiles`.
    fn check_unique(
        &self,
        fields: &ProfileFields,
        excluding: Option<UserProfileId>,
    ) -> StoreResult<()> {
        if self
            .by_domain_username(&fields.domain, &fields.username, excluding)
            .is_some()
        {
            return Err(DbError::UniqueViolation {
                constraint: ACTIVE_DOMAIN_USERNAME_CONSTRAINT.to_string(),
            });
        }
        if !fields.email.is_empty() && self.by_email(&fields.email, excluding).is_some() {
            return Err(DbError::UniqueViolation {
                constraint: ACTIVE_EMAIL_CONSTRAINT.to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory [`AccessStore`] with catalog seeding and fault injection.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAccessStore {
    state: Arc<Mutex<MemoryState>>,
    failure: Arc<RwLock<Option<FailurePoint>>>,
}

impl InMemoryAccessStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_domain(&self, id: i32, name: &str) {
        self.state.lock().await.domains.push(Domain {
            id: DomainId::new(id),
            name: name.to_string(),
        });
    }

    pub async fn add_branch(&self, code: &str, name: &str) {
        self.state.lock().await.branches.push(Branch {
            code: BranchCode::new(code),
            name: name.to_string(),
        });
    }

    pub async fn add_system(&self, id: i32, name: &str) {
        self.state.lock().await.systems.push(LocalSystem {
            id: SystemId::new(id),
            name: name.to_string(),
        });
    }

    pub async fn add_permission_level(&self, id: i32, system_id: i32, name: &str) {
        self.state.lock().await.levels.push(PermissionLevel {
            id: PermissionLevelId::new(id),
            system_id: SystemId::new(system_id),
            name: name.to_string(),
        });
    }

    /// Make every later transaction fail at `point` until cleared.
    pub async fn fail_at(&self, point: FailurePoint) {
        *self.failure.write().await = Some(point);
    }

    /// Stop injecting failures.
    pub async fn clear_failure(&self) {
        *self.failure.write().await = None;
    }

    /// A profile row regardless of status.
    pub async fn profile_row(&self, id: UserProfileId) -> Option<UserProfile> {
        self.state.lock().await.profiles.get(&id).cloned()
    }

    /// Every system access row ever written for a user, retired ones included.
    pub async fn system_access_rows(&self, user_id: UserProfileId) -> Vec<SystemAccess> {
        self.state
            .lock()
            .await
            .system_access
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Every branch grant row ever written for a user, retired ones included.
    pub async fn branch_grant_rows(&self, user_id: UserProfileId) -> Vec<BranchGrant> {
        self.state
            .lock()
            .await
            .branch_grants
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Number of profile rows regardless of status.
    pub async fn profile_count(&self) -> usize {
        self.state.lock().await.profiles.len()
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryAccessStore {
    async fn list_domains(&self) -> StoreResult<Vec<Domain>> {
        let mut domains = self.state.lock().await.domains.clone();
        domains.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(domains)
    }

    async fn list_branches(&self) -> StoreResult<Vec<Branch>> {
        let mut branches = self.state.lock().await.branches.clone();
        branches.sort_by(|a, b| a.name.cmp(&b.name).then(a.code.cmp(&b.code)));
        Ok(branches)
    }

    async fn list_systems(&self) -> StoreResult<Vec<LocalSystem>> {
        let mut systems = self.state.lock().await.systems.clone();
        systems.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(systems)
    }

    async fn list_permission_levels(
        &self,
        system_id: SystemId,
    ) -> StoreResult<Vec<PermissionLevel>> {
        let mut levels: Vec<_> = self
            .state
            .lock()
            .await
            .levels
            .iter()
            .filter(|level| level.system_id == system_id)
            .cloned()
            .collect();
        levels.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(levels)
    }

    async fn list_all_permission_levels(&self) -> StoreResult<Vec<PermissionLevel>> {
        let mut levels = self.state.lock().await.levels.clone();
        levels.sort_by(|a, b| {
            a.system_id
                .cmp(&b.system_id)
                .then_with(|| a.name.cmp(&b.name))
                .then(a.id.cmp(&b.id))
        });
        Ok(levels)
    }
}

#[async_trait::async_trait]
impl AccessStore for InMemoryAccessStore {
    async fn find_active_profile(&self, id: UserProfileId) -> StoreResult<Option<UserProfile>> {
        Ok(self.state.lock().await.active_profile(id).cloned())
    }

    async fn list_active_profiles(&self) -> StoreResult<Vec<UserProfile>> {
        Ok(self.state.lock().await.active_profiles_sorted())
    }

    async fn active_system_access(
        &self,
        user_id: UserProfileId,
    ) -> StoreResult<Vec<SystemAccess>> {
        Ok(self.state.lock().await.active_access_for(user_id))
    }

    async fn active_branch_grants(
        &self,
        user_id: UserProfileId,
    ) -> StoreResult<Vec<BranchGrant>> {
        Ok(self.state.lock().await.active_grants_for(user_id))
    }

    async fn begin(&self) -> StoreResult<Box<dyn AccessTransaction>> {
        let failure = *self.failure.read().await;
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            snapshot: Some(snapshot),
            failure,
        }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
    failure: Option<FailurePoint>,
}

impl MemoryTransaction {
    fn inject(&self, point: FailurePoint) -> StoreResult<()> {
        if self.failure == Some(point) {
            return Err(DbError::Unavailable(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.restore();
    }
}

#[async_trait::async_trait]
impl AccessTransaction for MemoryTransaction {
    async fn find_active_profile(
        &mut self,
        id: UserProfileId,
    ) -> StoreResult<Option<UserProfile>> {
        Ok(self.guard.active_profile(id).cloned())
    }

    async fn find_active_by_domain_username(
        &mut self,
        domain: &str,
        username: &str,
        excluding: Option<UserProfileId>,
    ) -> StoreResult<Option<UserProfile>> {
        Ok(self
            .guard
            .by_domain_username(domain, username, excluding)
            .cloned())
    }

    async fn find_active_by_email(
        &mut self,
        email: &str,
        excluding: Option<UserProfileId>,
    ) -> StoreResult<Option<UserProfile>> {
        Ok(self.guard.by_email(email, excluding).cloned())
    }

    async fn insert_profile(
        &mut self,
        fields: &ProfileFields,
        stamp: &AuditStamp,
    ) -> StoreResult<UserProfile> {
        self.guard.check_unique(fields, None)?;

        self.guard.last_profile_id += 1;
        let profile = UserProfile {
            id: UserProfileId::new(self.guard.last_profile_id),
            domain: fields.domain.clone(),
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            username: fields.username.clone(),
            email: fields.email.clone(),
            is_admin: fields.is_admin,
            operator_id: fields.operator_id,
            status: status::ACTIVE,
            created_at: stamp.at,
            created_by: stamp.actor.clone(),
            modified_at: None,
            modified_by: None,
        };
        self.guard.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn update_profile(
        &mut self,
        id: UserProfileId,
        fields: Option<&ProfileFields>,
        stamp: &AuditStamp,
    ) -> StoreResult<bool> {
        self.inject(FailurePoint::UpdateProfile)?;

        if self.guard.active_profile(id).is_none() {
            return Ok(false);
        }
        if let Some(fields) = fields {
            self.guard.check_unique(fields, Some(id))?;
        }

        let Some(profile) = self.guard.profiles.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(fields) = fields {
            profile.domain.clone_from(&fields.domain);
            profile.first_name.clone_from(&fields.first_name);
            profile.last_name.clone_from(&fields.last_name);
            profile.username.clone_from(&fields.username);
            profile.email.clone_from(&fields.email);
            profile.is_admin = fields.is_admin;
            profile.operator_id = fields.operator_id;
        }
        profile.modified_at = Some(stamp.at);
        profile.modified_by = Some(stamp.actor.clone());
        Ok(true)
    }

    async fn retire_profile(
        &mut self,
        id: UserProfileId,
        stamp: &AuditStamp,
    ) -> StoreResult<bool> {
        match self.guard.profiles.get_mut(&id) {
            Some(profile) if profile.is_active() => {
                profile.status = status::RETIRED;
                profile.modified_at = Some(stamp.at);
                profile.modified_by = Some(stamp.actor.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn lock_profile(&mut self, id: UserProfileId) -> StoreResult<Option<UserProfile>> {
        // The whole store is already held exclusively.
        Ok(self.guard.active_profile(id).cloned())
    }

    async fn active_system_access(
        &mut self,
        user_id: UserProfileId,
    ) -> StoreResult<Vec<SystemAccess>> {
        Ok(self.guard.active_access_for(user_id))
    }

    async fn active_branch_grants(
        &mut self,
        user_id: UserProfileId,
    ) -> StoreResult<Vec<BranchGrant>> {
        Ok(self.guard.active_grants_for(user_id))
    }

    async fn retire_grants(
        &mut self,
        user_id: UserProfileId,
        stamp: &AuditStamp,
    ) -> StoreResult<(u64, u64)> {
        self.inject(FailurePoint::RetireGrants)?;

        let mut access_retired = 0;
        for row in self
            .guard
            .system_access
            .iter_mut()
            .filter(|row| row.user_id == user_id && row.is_active())
        {
            row.status = status::RETIRED;
            row.modified_at = Some(stamp.at);
            row.modified_by = Some(stamp.actor.clone());
            access_retired += 1;
        }

        let mut grants_retired = 0;
        for row in self
            .guard
            .branch_grants
            .iter_mut()
            .filter(|row| row.user_id == user_id && row.is_active())
        {
            row.status = status::RETIRED;
            row.modified_at = Some(stamp.at);
            row.modified_by = Some(stamp.actor.clone());
            grants_retired += 1;
        }

        Ok((access_retired, grants_retired))
    }

    async fn insert_system_access(
        &mut self,
        input: &NewSystemAccess,
        stamp: &AuditStamp,
    ) -> StoreResult<SystemAccess> {
        self.inject(FailurePoint::InsertSystemAccess)?;

        self.guard.last_access_id += 1;
        let row = SystemAccess {
            id: self.guard.last_access_id,
            user_id: input.user_id,
            system_id: input.system_id,
            permission_level_id: input.permission_level_id,
            status: status::ACTIVE,
            created_at: stamp.at,
            created_by: stamp.actor.clone(),
            modified_at: Some(stamp.at),
            modified_by: Some(stamp.actor.clone()),
        };
        self.guard.system_access.push(row.clone());
        Ok(row)
    }

    async fn insert_branch_grant(
        &mut self,
        input: &NewBranchGrant,
        stamp: &AuditStamp,
    ) -> StoreResult<BranchGrant> {
        self.inject(FailurePoint::InsertBranchGrant)?;

        self.guard.last_grant_id += 1;
        let row = BranchGrant {
            id: self.guard.last_grant_id,
            user_id: input.user_id,
            system_id: input.system_id,
            branch_code: input.branch_code.clone(),
            status: status::ACTIVE,
            created_at: stamp.at,
            created_by: stamp.actor.clone(),
            modified_at: Some(stamp.at),
            modified_by: Some(stamp.actor.clone()),
        };
        self.guard.branch_grants.push(row.clone());
        Ok(row)
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.inject(FailurePoint::Commit)?;
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.restore();
        Ok(())
    }
}
