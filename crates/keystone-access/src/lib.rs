//! User administration and permission reconciliation for keystone.
//!
//! The crate manages user profiles and, per user, a grant matrix of
//! (system, branch, permission level) entries.
//!
//! # Components
//!
//! - [`catalog::CatalogReader`] reads domains, branches, systems and levels
//! - [`matrix::MatrixBuilder`] assembles the grant matrix for display or edit
//! - [`reconcile`] validates proposals and replaces a user's grant set
//!   (retire every active grant, insert the new set)
//! - [`service::UserAdminService`] creates, updates and soft-deletes users
//!
//! Storage sits behind the [`store::AccessStore`] trait, with an in-memory
//! implementation for tests and a PostgreSQL one over `keystone-db`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use keystone_access::{
//!     CreateUserRequest, InMemoryAccessStore, SystemSelection, UserAdminService,
//! };
//! use keystone_core::{AuditStamp, PermissionLevelId, SystemId};
//! use keystone_db::ProfileFields;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> keystone_access::Result<()> {
//! let service = UserAdminService::new(Arc::new(InMemoryAccessStore::new()));
//! let request = CreateUserRequest {
//!     profile: ProfileFields {
//!         domain: "ACME".into(),
//!         first_name: "Jane".into(),
//!         last_name: "Doe".into(),
//!         username: "jdoe".into(),
//!         ..Default::default()
//!     },
//!     permissions: vec![SystemSelection::new(SystemId::new(1))
//!         .with_level(PermissionLevelId::new(2))
//!         .check("NY")],
//! };
//! let stamp = AuditStamp::new("admin", Utc::now());
//! let id = service.create(request, &stamp, &CancellationToken::new()).await?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod matrix;
pub mod models;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod validation;

pub use catalog::{CatalogReader, CatalogSnapshot};
pub use error::{AccessError, Result};
pub use matrix::{BranchCheck, LevelOption, MatrixBuilder, PermissionRow, UserPermissionMatrix};
pub use models::{CreateUserRequest, UpdateUserRequest, UserSummary};
pub use reconcile::{
    GrantPlan, LockPolicy, ParseLockPolicyError, PlannedGrant, ReconcileOptions,
    ReconcileSummary, SystemSelection,
};
pub use service::UserAdminService;
pub use store::{
    AccessStore, AccessTransaction, CatalogStore, FailurePoint, InMemoryAccessStore,
    PgAccessStore,
};
pub use validation::FieldViolation;
