//! keystone Core Library
//!
//! Shared types for keystone.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (UserProfileId, SystemId, PermissionLevelId, BranchCode)
//! - [`status`] - Soft-delete status values
//! - [`audit`] - Actor/timestamp stamps threaded through every write
//!
//! # Example
//!
//! ```
//! use keystone_core::{status, AuditStamp, UserProfileId};
//!
//! let user = UserProfileId::new(1);
//! let stamp = AuditStamp::new("admin", chrono::Utc::now());
//! assert!(status::is_active(status::ACTIVE));
//! # let _ = (user, stamp);
//! ```

pub mod audit;
pub mod ids;
pub mod status;

pub use audit::AuditStamp;
pub use ids::{BranchCode, DomainId, ParseIdError, PermissionLevelId, SystemId, UserProfileId};
