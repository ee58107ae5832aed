//! Shared fixtures for keystone-access integration tests.
//!
//! Every test gets its own in-memory store seeded with the same catalog:
//!
//! | System | Levels                  |
//! |--------|-------------------------|
//! | S1 (1) | Viewer (1), Editor (2)  |
//! | S2 (2) | Operator (3)            |
//!
//! Branches NY and LA, domain ACME.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::{DateTime, Duration, TimeZone, Utc};
use keystone_access::{
    CreateUserRequest, InMemoryAccessStore, SystemSelection, UserAdminService,
};
use keystone_core::{AuditStamp, BranchCode, PermissionLevelId, SystemId, UserProfileId};
use keystone_db::ProfileFields;
use tokio_util::sync::CancellationToken;

static INIT: Once = Once::new();

/// Initialize logging for tests (once), only when `RUST_LOG` is set.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub const S1: SystemId = SystemId::new(1);
pub const S2: SystemId = SystemId::new(2);
pub const VIEWER: PermissionLevelId = PermissionLevelId::new(1);
pub const EDITOR: PermissionLevelId = PermissionLevelId::new(2);
pub const OPERATOR: PermissionLevelId = PermissionLevelId::new(3);

pub struct TestContext {
    pub store: Arc<InMemoryAccessStore>,
    pub service: UserAdminService,
    pub cancel: CancellationToken,
}

impl TestContext {
    pub async fn new() -> Self {
        init_test_logging();
        let store = Arc::new(InMemoryAccessStore::new());
        store.add_domain(1, "ACME").await;
        store.add_system(1, "S1").await;
        store.add_system(2, "S2").await;
        store.add_permission_level(1, 1, "Viewer").await;
        store.add_permission_level(2, 1, "Editor").await;
        store.add_permission_level(3, 2, "Operator").await;
        store.add_branch("NY", "New York").await;
        store.add_branch("LA", "Los Angeles").await;

        Self {
            service: UserAdminService::new(store.clone()),
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Create `username` in ACME with the given grants.
    pub async fn create_user(
        &self,
        username: &str,
        permissions: Vec<SystemSelection>,
    ) -> UserProfileId {
        self.service
            .create(
                CreateUserRequest {
                    profile: profile(username, &format!("{username}@acme.test")),
                    permissions,
                },
                &stamp("creator", 0),
                &self.cancel,
            )
            .await
            .expect("Failed to create user")
    }

    /// Active system access as `(system, level)`, sorted.
    pub async fn active_access(&self, user_id: UserProfileId) -> Vec<(SystemId, PermissionLevelId)> {
        let mut rows: Vec<_> = self
            .store
            .system_access_rows(user_id)
            .await
            .into_iter()
            .filter(|row| row.is_active())
            .map(|row| (row.system_id, row.permission_level_id))
            .collect();
        rows.sort();
        rows
    }

    /// Active branch grants as `(system, code)`, sorted.
    pub async fn active_branches(&self, user_id: UserProfileId) -> Vec<(SystemId, BranchCode)> {
        let mut rows: Vec<_> = self
            .store
            .branch_grant_rows(user_id)
            .await
            .into_iter()
            .filter(|row| row.is_active())
            .map(|row| (row.system_id, row.branch_code))
            .collect();
        rows.sort();
        rows
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

/// A stamp `minutes` after the base time.
pub fn stamp(actor: &str, minutes: i64) -> AuditStamp {
    AuditStamp::new(actor, base_time() + Duration::minutes(minutes))
}

pub fn profile(username: &str, email: &str) -> ProfileFields {
    ProfileFields {
        domain: "ACME".to_string(),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        username: username.to_string(),
        email: email.to_string(),
        is_admin: false,
        operator_id: None,
    }
}

pub fn select(system: SystemId) -> SystemSelection {
    SystemSelection::new(system)
}

pub fn branch(code: &str) -> BranchCode {
    BranchCode::new(code)
}
