//! User lifecycle service.
//!
//! Every write validates its whole input first, then runs in a single store
//! transaction: uniqueness checks, grant reconciliation and the profile write
//! commit together or not at all. Cancellation is observed before the
//! transaction begins and again before it commits.

use std::future::Future;
use std::sync::Arc;

use keystone_core::{AuditStamp, UserProfileId};
use keystone_db::ProfileFields;
use tokio_util::sync::CancellationToken;

use crate::catalog::CatalogReader;
use crate::error::{AccessError, Result};
use crate::matrix::{MatrixBuilder, UserPermissionMatrix};
use crate::models::{CreateUserRequest, UpdateUserRequest, UserSummary};
use crate::reconcile::{
    reconcile, validate_selections, GrantPlan, LockPolicy, ReconcileOptions, ReconcileSummary,
    SystemSelection,
};
use crate::store::{AccessStore, AccessTransaction};
use crate::validation::{validate_profile_fields, FieldViolation};

/// Service for creating, updating and retiring users and their grants.
#[derive(Clone)]
pub struct UserAdminService {
    store: Arc<dyn AccessStore>,
    catalog: CatalogReader,
    matrix: MatrixBuilder,
    options: ReconcileOptions,
}

impl UserAdminService {
    /// Create a service over `store` with default options.
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: AccessStore + 'static,
    {
        let catalog = CatalogReader::new(store.clone());
        let store: Arc<dyn AccessStore> = store;
        Self {
            matrix: MatrixBuilder::new(store.clone(), catalog.clone()),
            catalog,
            store,
            options: ReconcileOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Options applied to every write.
    #[must_use]
    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// The catalog reader this service validates against.
    #[must_use]
    pub fn catalog(&self) -> &CatalogReader {
        &self.catalog
    }

    /// Create a user and their initial grants. Returns the new id.
    ///
    /// # Errors
    ///
    /// - `AccessError::Validation` for bad profile fields or matrix entries
    /// - `AccessError::UsernameConflict` / `AccessError::EmailConflict` if an
    ///   active user already holds the login or email
    /// - `AccessError::Cancelled`, `AccessError::Storage`
    pub async fn create(
        &self,
        request: CreateUserRequest,
        stamp: &AuditStamp,
        cancel: &CancellationToken,
    ) -> Result<UserProfileId> {
        let fields = request.profile.normalized();
        let plan = self.validate(Some(&fields), &request.permissions).await?;

        if cancel.is_cancelled() {
            return Err(AccessError::Cancelled);
        }

        let mut tx = self.store.begin().await?;
        let outcome = create_in(tx.as_mut(), &fields, &plan, stamp).await;
        let (user_id, summary) = finish(tx, cancel, outcome).await?;

        tracing::info!(
            user_id = %user_id,
            actor = %stamp.actor,
            system_access = summary.system_access_inserted,
            branch_grants = summary.branch_grants_inserted,
            "User created"
        );

        Ok(user_id)
    }

    /// Replace a user's grant set and optionally their profile fields.
    ///
    /// # Errors
    ///
    /// - `AccessError::NotFound` if `user_id` is not an active profile
    /// - `AccessError::Validation`, `AccessError::UsernameConflict`,
    ///   `AccessError::EmailConflict`, `AccessError::Cancelled`,
    ///   `AccessError::Storage`
    pub async fn update(
        &self,
        user_id: UserProfileId,
        request: UpdateUserRequest,
        stamp: &AuditStamp,
        cancel: &CancellationToken,
    ) -> Result<ReconcileSummary> {
        if self.store.find_active_profile(user_id).await?.is_none() {
            return Err(AccessError::NotFound(user_id));
        }

        let fields = request.profile.as_ref().map(ProfileFields::normalized);
        let plan = self.validate(fields.as_ref(), &request.permissions).await?;

        if cancel.is_cancelled() {
            return Err(AccessError::Cancelled);
        }

        let mut tx = self.store.begin().await?;
        let outcome = update_in(
            tx.as_mut(),
            user_id,
            fields.as_ref(),
            &plan,
            stamp,
            self.options.lock,
        )
        .await;
        let summary = finish(tx, cancel, outcome).await?;

        tracing::info!(
            user_id = %user_id,
            actor = %stamp.actor,
            profile_changed = fields.is_some(),
            system_access_retired = summary.system_access_retired,
            branch_grants_retired = summary.branch_grants_retired,
            system_access_inserted = summary.system_access_inserted,
            branch_grants_inserted = summary.branch_grants_inserted,
            "User updated"
        );

        Ok(summary)
    }

    /// Soft-delete a user and retire all their grants.
    ///
    /// Returns `false` and writes nothing if the user is missing or already
    /// inactive.
    ///
    /// # Errors
    ///
    /// `AccessError::Cancelled` or `AccessError::Storage`.
    pub async fn soft_delete(
        &self,
        user_id: UserProfileId,
        stamp: &AuditStamp,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(AccessError::Cancelled);
        }

        let mut tx = self.store.begin().await?;
        let outcome = delete_in(tx.as_mut(), user_id, stamp, self.options.lock).await;
        let Some((access, grants)) = finish(tx, cancel, outcome).await? else {
            tracing::debug!(user_id = %user_id, "Soft delete skipped, user not active");
            return Ok(false);
        };

        tracing::info!(
            user_id = %user_id,
            actor = %stamp.actor,
            system_access_retired = access,
            branch_grants_retired = grants,
            "User soft-deleted"
        );

        Ok(true)
    }

    /// An active user by id.
    ///
    /// # Errors
    ///
    /// `AccessError::Cancelled` if `cancel` fires before the read completes.
    pub async fn get(
        &self,
        user_id: UserProfileId,
        cancel: &CancellationToken,
    ) -> Result<Option<UserSummary>> {
        let profile = until_cancelled(cancel, async {
            self.store
                .find_active_profile(user_id)
                .await
                .map_err(AccessError::from)
        })
        .await?;
        Ok(profile.map(UserSummary::from))
    }

    /// Every active user, ordered by first name.
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<UserSummary>> {
        let profiles = until_cancelled(cancel, async {
            self.store
                .list_active_profiles()
                .await
                .map_err(AccessError::from)
        })
        .await?;
        tracing::debug!(count = profiles.len(), "Listed active users");
        Ok(profiles.into_iter().map(UserSummary::from).collect())
    }

    /// The current grant matrix of an active user.
    ///
    /// # Errors
    ///
    /// `AccessError::NotFound` if `user_id` is not an active profile,
    /// `AccessError::Cancelled` if `cancel` fires first.
    pub async fn edit_matrix(
        &self,
        user_id: UserProfileId,
        cancel: &CancellationToken,
    ) -> Result<UserPermissionMatrix> {
        until_cancelled(cancel, self.matrix.edit_matrix(user_id)).await
    }

    /// An empty grant matrix for a user being created.
    pub async fn blank_matrix(&self, cancel: &CancellationToken) -> Result<UserPermissionMatrix> {
        until_cancelled(cancel, self.matrix.blank_matrix()).await
    }

    async fn validate(
        &self,
        fields: Option<&ProfileFields>,
        permissions: &[SystemSelection],
    ) -> Result<GrantPlan> {
        let mut errors: Vec<FieldViolation> =
            fields.map(validate_profile_fields).unwrap_or_default();

        let catalog = self.catalog.snapshot().await?;
        let plan = match validate_selections(&catalog, permissions) {
            Ok(plan) => plan,
            Err(violations) => {
                errors.extend(violations);
                GrantPlan::default()
            }
        };

        if errors.is_empty() {
            Ok(plan)
        } else {
            tracing::debug!(errors = errors.len(), "Rejected invalid request");
            Err(AccessError::validation(errors))
        }
    }
}

/// Run a read, abandoning it as soon as `cancel` fires.
async fn until_cancelled<T, F>(cancel: &CancellationToken, read: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AccessError::Cancelled),
        result = read => result,
    }
}

/// Commit on success unless cancelled; otherwise roll back.
async fn finish<T>(
    tx: Box<dyn AccessTransaction>,
    cancel: &CancellationToken,
    outcome: Result<T>,
) -> Result<T> {
    match outcome {
        Ok(value) if !cancel.is_cancelled() => {
            tx.commit().await?;
            Ok(value)
        }
        Ok(_) => {
            rollback(tx, &AccessError::Cancelled).await;
            Err(AccessError::Cancelled)
        }
        Err(err) => {
            rollback(tx, &err).await;
            Err(err)
        }
    }
}

async fn rollback(tx: Box<dyn AccessTransaction>, cause: &AccessError) {
    tracing::warn!(error = %cause, "Rolling back transaction");
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "Rollback failed");
    }
}

async fn ensure_unique(
    tx: &mut dyn AccessTransaction,
    fields: &ProfileFields,
    excluding: Option<UserProfileId>,
) -> Result<()> {
    if tx
        .find_active_by_domain_username(&fields.domain, &fields.username, excluding)
        .await?
        .is_some()
    {
        return Err(AccessError::UsernameConflict {
            domain: fields.domain.clone(),
            username: fields.username.clone(),
        });
    }

    if !fields.email.is_empty()
        && tx
            .find_active_by_email(&fields.email, excluding)
            .await?
            .is_some()
    {
        return Err(AccessError::EmailConflict);
    }

    Ok(())
}

async fn create_in(
    tx: &mut dyn AccessTransaction,
    fields: &ProfileFields,
    plan: &GrantPlan,
    stamp: &AuditStamp,
) -> Result<(UserProfileId, ReconcileSummary)> {
    ensure_unique(tx, fields, None).await?;

    let profile = tx
        .insert_profile(fields, stamp)
        .await
        .map_err(|err| AccessError::from_profile_write(err, &fields.domain, &fields.username))?;

    let summary = reconcile(tx, profile.id, plan, stamp).await?;
    Ok((profile.id, summary))
}

async fn load_profile(
    tx: &mut dyn AccessTransaction,
    user_id: UserProfileId,
    lock: LockPolicy,
) -> Result<bool> {
    let profile = match lock {
        LockPolicy::LockProfileRow => tx.lock_profile(user_id).await?,
        LockPolicy::None => tx.find_active_profile(user_id).await?,
    };
    Ok(profile.is_some())
}

async fn update_in(
    tx: &mut dyn AccessTransaction,
    user_id: UserProfileId,
    fields: Option<&ProfileFields>,
    plan: &GrantPlan,
    stamp: &AuditStamp,
    lock: LockPolicy,
) -> Result<ReconcileSummary> {
    if !load_profile(tx, user_id, lock).await? {
        return Err(AccessError::NotFound(user_id));
    }
    if let Some(fields) = fields {
        ensure_unique(tx, fields, Some(user_id)).await?;
    }

    let summary = reconcile(tx, user_id, plan, stamp).await?;

    let updated = tx
        .update_profile(user_id, fields, stamp)
        .await
        .map_err(|err| match fields {
            Some(fields) => AccessError::from_profile_write(err, &fields.domain, &fields.username),
            None => AccessError::Storage(err),
        })?;
    if !updated {
        return Err(AccessError::NotFound(user_id));
    }

    Ok(summary)
}

async fn delete_in(
    tx: &mut dyn AccessTransaction,
    user_id: UserProfileId,
    stamp: &AuditStamp,
    lock: LockPolicy,
) -> Result<Option<(u64, u64)>> {
    if !load_profile(tx, user_id, lock).await? {
        return Ok(None);
    }

    let retired = tx.retire_grants(user_id, stamp).await?;
    tx.retire_profile(user_id, stamp).await?;
    Ok(Some(retired))
}
