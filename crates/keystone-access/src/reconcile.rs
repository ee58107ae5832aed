//! Permission reconciliation.
//!
//! A proposal is a list of [`SystemSelection`]s. [`validate_selections`] checks
//! every entry against the catalog and the cross-field rules, collecting all
//! violations, and produces a [`GrantPlan`]. [`reconcile`] then retires every
//! active grant of the user and inserts the plan, inside the caller's
//! transaction.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use keystone_core::{AuditStamp, BranchCode, PermissionLevelId, SystemId, UserProfileId};
use keystone_db::{NewBranchGrant, NewSystemAccess};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::CatalogSnapshot;
use crate::matrix::{BranchCheck, PermissionRow};
use crate::store::{AccessTransaction, StoreResult};
use crate::validation::FieldViolation;

/// Proposed grants for one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSelection {
    pub system_id: SystemId,
    /// Chosen level. `None` or a non-positive id means no level.
    #[serde(default)]
    pub permission_level_id: Option<PermissionLevelId>,
    #[serde(default)]
    pub branches: BTreeMap<BranchCode, BranchCheck>,
}

impl SystemSelection {
    /// An entry with no level and no branches.
    #[must_use]
    pub fn new(system_id: SystemId) -> Self {
        Self {
            system_id,
            permission_level_id: None,
            branches: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: PermissionLevelId) -> Self {
        self.permission_level_id = Some(level);
        self
    }

    /// Mark a branch as checked.
    #[must_use]
    pub fn check(mut self, code: impl Into<BranchCode>) -> Self {
        self.branches.insert(
            code.into(),
            BranchCheck {
                name: String::new(),
                checked: true,
            },
        );
        self
    }

    /// The level, if one was actually chosen.
    #[must_use]
    pub fn chosen_level(&self) -> Option<PermissionLevelId> {
        self.permission_level_id.filter(|level| level.is_chosen())
    }

    pub fn checked_branches(&self) -> impl Iterator<Item = &BranchCode> {
        self.branches
            .iter()
            .filter(|(_, check)| check.checked)
            .map(|(code, _)| code)
    }
}

impl From<PermissionRow> for SystemSelection {
    fn from(row: PermissionRow) -> Self {
        Self {
            system_id: row.system_id,
            permission_level_id: row.selected_permission_level_id,
            branches: row.branches,
        }
    }
}

/// Grants to insert for one system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedGrant {
    pub system_id: SystemId,
    pub permission_level_id: PermissionLevelId,
    /// Canonical catalog codes, at least one.
    pub branches: Vec<BranchCode>,
}

/// Validated set of grants a reconciliation will insert, in proposal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantPlan {
    pub grants: Vec<PlannedGrant>,
}

impl GrantPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    #[must_use]
    pub fn system_access_count(&self) -> usize {
        self.grants.len()
    }

    #[must_use]
    pub fn branch_grant_count(&self) -> usize {
        self.grants.iter().map(|g| g.branches.len()).sum()
    }
}

/// Validate a proposal against the catalog and the cross-field rules.
///
/// Every entry is checked; all violations are returned together. Entries with
/// neither a level nor a checked branch are dropped from the plan.
///
/// # Errors
///
/// The list of violations if any entry is invalid.
pub fn validate_selections(
    catalog: &CatalogSnapshot,
    selections: &[SystemSelection],
) -> Result<GrantPlan, Vec<FieldViolation>> {
    let mut errors = Vec::new();
    let mut plan = GrantPlan::default();
    let mut seen_systems = HashSet::new();

    for (idx, selection) in selections.iter().enumerate() {
        let field = format!("permissions[{idx}]");
        let system_id = selection.system_id;
        let before = errors.len();
        let violation = |code: &str, message: String| {
            FieldViolation::with_constraints(
                field.clone(),
                code,
                message,
                json!({ "system_id": system_id.get() }),
            )
            .for_system(system_id)
        };

        if !seen_systems.insert(system_id) {
            errors.push(violation(
                "duplicate_system",
                format!("system {system_id} is listed more than once"),
            ));
            continue;
        }

        let known_system = catalog.system(system_id).is_some();
        if !known_system {
            errors.push(violation(
                "unknown_system",
                format!("system {system_id} does not exist"),
            ));
        }

        let mut branches: Vec<BranchCode> = Vec::new();
        for code in selection.checked_branches() {
            match catalog.branch(code) {
                Some(branch) => {
                    if !branches.contains(&branch.code) {
                        branches.push(branch.code.clone());
                    }
                }
                None => errors.push(violation(
                    "unknown_branch",
                    format!("branch {code} does not exist"),
                )),
            }
        }
        let any_checked = selection.checked_branches().next().is_some();
        let level = selection.chosen_level();

        match level {
            None if any_checked => errors.push(violation(
                "permission_required",
                "permission level required when a branch is selected".to_string(),
            )),
            Some(_) if !any_checked => errors.push(violation(
                "branch_required",
                "at least one branch required when a permission level is selected".to_string(),
            )),
            _ => {}
        }

        if let Some(level) = level {
            if known_system && !catalog.level_belongs_to(level, system_id) {
                errors.push(violation(
                    "invalid_permission_level",
                    format!("permission level {level} does not belong to system {system_id}"),
                ));
            }
        }

        if errors.len() == before {
            if let Some(level) = level {
                plan.grants.push(PlannedGrant {
                    system_id,
                    permission_level_id: level,
                    branches,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(plan)
    } else {
        Err(errors)
    }
}

/// Whether reconciliation serializes on the profile row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPolicy {
    /// Concurrent reconciliations of one user may interleave; the last commit
    /// wins.
    #[default]
    None,
    /// Lock the profile row (`SELECT ... FOR UPDATE`) before touching grants.
    LockProfileRow,
}

/// Error parsing a [`LockPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lock policy '{0}', expected 'none' or 'row'")]
pub struct ParseLockPolicyError(String);

impl FromStr for LockPolicy {
    type Err = ParseLockPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "row" | "lock_profile_row" => Ok(Self::LockProfileRow),
            other => Err(ParseLockPolicyError(other.to_string())),
        }
    }
}

impl fmt::Display for LockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::LockProfileRow => f.write_str("row"),
        }
    }
}

/// Tunables for write operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub lock: LockPolicy,
}

/// Row counts from one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub system_access_retired: u64,
    pub branch_grants_retired: u64,
    pub system_access_inserted: u64,
    pub branch_grants_inserted: u64,
}

/// Replace the active grant set of `user_id` with `plan`.
///
/// Retires every active grant, then inserts one system access row per planned
/// system and one branch grant per planned branch, all stamped with `stamp`.
/// The caller owns the transaction; any error leaves it to be rolled back.
pub async fn reconcile(
    tx: &mut dyn AccessTransaction,
    user_id: UserProfileId,
    plan: &GrantPlan,
    stamp: &AuditStamp,
) -> StoreResult<ReconcileSummary> {
    let prior_access = tx.active_system_access(user_id).await?;
    let prior_grants = tx.active_branch_grants(user_id).await?;
    tracing::debug!(
        user_id = %user_id,
        system_access = prior_access.len(),
        branch_grants = prior_grants.len(),
        "Retiring prior grants"
    );

    let (system_access_retired, branch_grants_retired) = tx.retire_grants(user_id, stamp).await?;
    let mut summary = ReconcileSummary {
        system_access_retired,
        branch_grants_retired,
        ..ReconcileSummary::default()
    };

    for grant in &plan.grants {
        tx.insert_system_access(
            &NewSystemAccess {
                user_id,
                system_id: grant.system_id,
                permission_level_id: grant.permission_level_id,
            },
            stamp,
        )
        .await?;
        summary.system_access_inserted += 1;

        for code in &grant.branches {
            tx.insert_branch_grant(
                &NewBranchGrant {
                    user_id,
                    system_id: grant.system_id,
                    branch_code: code.clone(),
                },
                stamp,
            )
            .await?;
            summary.branch_grants_inserted += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_db::{Branch, LocalSystem, PermissionLevel};

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new(
            vec![
                LocalSystem {
                    id: SystemId::new(1),
                    name: "S1".to_string(),
                },
                LocalSystem {
                    id: SystemId::new(2),
                    name: "S2".to_string(),
                },
            ],
            vec![
                Branch {
                    code: BranchCode::new("NY"),
                    name: "New York".to_string(),
                },
                Branch {
                    code: BranchCode::new("LA"),
                    name: "Los Angeles".to_string(),
                },
            ],
            vec![
                PermissionLevel {
                    id: PermissionLevelId::new(1),
                    system_id: SystemId::new(1),
                    name: "Viewer".to_string(),
                },
                PermissionLevel {
                    id: PermissionLevelId::new(2),
                    system_id: SystemId::new(1),
                    name: "Editor".to_string(),
                },
                PermissionLevel {
                    id: PermissionLevelId::new(3),
                    system_id: SystemId::new(2),
                    name: "Operator".to_string(),
                },
            ],
        )
    }

    fn s1() -> SystemSelection {
        SystemSelection::new(SystemId::new(1))
    }

    fn codes(errors: &[FieldViolation]) -> Vec<&str> {
        errors.iter().map(|e| e.code.as_str()).collect()
    }

    #[test]
    fn test_level_with_branch_is_planned() {
        let plan = validate_selections(
            &catalog(),
            &[s1().with_level(PermissionLevelId::new(2)).check("NY")],
        )
        .unwrap();
        assert_eq!(plan.system_access_count(), 1);
        assert_eq!(plan.grants[0].branches, vec![BranchCode::new("NY")]);
    }

    #[test]
    fn test_branch_without_level_rejected() {
        let errors = validate_selections(&catalog(), &[s1().check("NY")]).unwrap_err();
        assert_eq!(codes(&errors), vec!["permission_required"]);
        assert_eq!(errors[0].system_id, Some(SystemId::new(1)));
    }

    #[test]
    fn test_zero_level_counts_as_none() {
        let errors = validate_selections(
            &catalog(),
            &[s1().with_level(PermissionLevelId::new(0)).check("NY")],
        )
        .unwrap_err();
        assert_eq!(codes(&errors), vec!["permission_required"]);
    }

    #[test]
    fn test_level_without_branch_rejected() {
        let errors = validate_selections(&catalog(), &[s1().with_level(PermissionLevelId::new(1))])
            .unwrap_err();
        assert_eq!(codes(&errors), vec!["branch_required"]);
    }

    #[test]
    fn test_empty_entry_is_omitted() {
        let plan = validate_selections(&catalog(), &[s1()]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_unchecked_branches_are_ignored() {
        let mut selection = s1().with_level(PermissionLevelId::new(1)).check("NY");
        selection.branches.insert(
            BranchCode::new("LA"),
            BranchCheck {
                name: "Los Angeles".to_string(),
                checked: false,
            },
        );
        let plan = validate_selections(&catalog(), &[selection]).unwrap();
        assert_eq!(plan.branch_grant_count(), 1);
    }

    #[test]
    fn test_all_entries_checked_before_failing() {
        let errors = validate_selections(
            &catalog(),
            &[
                s1().check("NY"),
                SystemSelection::new(SystemId::new(2)).with_level(PermissionLevelId::new(3)),
            ],
        )
        .unwrap_err();
        assert_eq!(codes(&errors), vec!["permission_required", "branch_required"]);
        assert_eq!(errors[1].field, "permissions[1]");
    }

    #[test]
    fn test_catalog_violations() {
        let errors = validate_selections(
            &catalog(),
            &[
                SystemSelection::new(SystemId::new(9))
                    .with_level(PermissionLevelId::new(1))
                    .check("NY"),
                s1().with_level(PermissionLevelId::new(3)).check("NY"),
                SystemSelection::new(SystemId::new(2))
                    .with_level(PermissionLevelId::new(3))
                    .check("SF"),
            ],
        )
        .unwrap_err();
        assert_eq!(
            codes(&errors),
            vec!["unknown_system", "invalid_permission_level", "unknown_branch"]
        );
    }

    #[test]
    fn test_duplicate_system_rejected() {
        let entry = s1().with_level(PermissionLevelId::new(1)).check("NY");
        let errors = validate_selections(&catalog(), &[entry.clone(), entry]).unwrap_err();
        assert_eq!(codes(&errors), vec!["duplicate_system"]);
    }

    #[test]
    fn test_branch_codes_canonicalized() {
        let plan = validate_selections(
            &catalog(),
            &[s1().with_level(PermissionLevelId::new(1)).check("ny").check("NY")],
        )
        .unwrap();
        assert_eq!(plan.grants[0].branches, vec![BranchCode::new("NY")]);
    }

    #[test]
    fn test_lock_policy_parse() {
        assert_eq!("row".parse::<LockPolicy>().unwrap(), LockPolicy::LockProfileRow);
        assert_eq!("NONE".parse::<LockPolicy>().unwrap(), LockPolicy::None);
        assert!("table".parse::<LockPolicy>().is_err());
        assert_eq!(LockPolicy::LockProfileRow.to_string(), "row");
    }
}
