//! Row models and their queries.

pub mod branch_grant;
pub mod catalog;
pub mod system_access;
pub mod user_profile;

pub use branch_grant::{BranchGrant, NewBranchGrant};
pub use catalog::{Branch, Domain, LocalSystem, PermissionLevel};
pub use system_access::{NewSystemAccess, SystemAccess};
pub use user_profile::{ProfileFields, UserProfile};
