//! Grant matrix assembly.
//!
//! A matrix has one [`PermissionRow`] per catalog system, each listing every
//! catalog branch with its checkbox state and the levels the system offers.
//! Assembly reads each collection once and merges in memory.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use keystone_core::{BranchCode, PermissionLevelId, SystemId, UserProfileId};
use keystone_db::{BranchGrant, PermissionLevel, SystemAccess, UserProfile};
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogReader, CatalogSnapshot};
use crate::error::{AccessError, Result};
use crate::store::AccessStore;

/// Checkbox state of one branch under one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCheck {
    /// Display name of the branch.
    #[serde(default)]
    pub name: String,
    pub checked: bool,
}

/// A permission level a system offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelOption {
    pub id: PermissionLevelId,
    pub name: String,
}

impl From<&PermissionLevel> for LevelOption {
    fn from(level: &PermissionLevel) -> Self {
        Self {
            id: level.id,
            name: level.name.clone(),
        }
    }
}

/// One system's row in the grant matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRow {
    pub system_id: SystemId,
    pub system_name: String,
    /// Every catalog branch keyed by code.
    pub branches: BTreeMap<BranchCode, BranchCheck>,
    /// Levels offered by this system, ordered by name.
    pub permission_levels: Vec<LevelOption>,
    /// The user's current level, `None` when the user has no access.
    pub selected_permission_level_id: Option<PermissionLevelId>,
}

impl PermissionRow {
    /// Codes of the checked branches.
    pub fn checked_branches(&self) -> impl Iterator<Item = &BranchCode> {
        self.branches
            .iter()
            .filter(|(_, check)| check.checked)
            .map(|(code, _)| code)
    }
}

/// The matrix for one user, or a blank one for a user being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissionMatrix {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    pub rows: Vec<PermissionRow>,
}

impl UserPermissionMatrix {
    /// The row of one system.
    #[must_use]
    pub fn row(&self, system_id: SystemId) -> Option<&PermissionRow> {
        self.rows.iter().find(|row| row.system_id == system_id)
    }
}

/// Merge catalog and grants into matrix rows, one per system in catalog order.
///
/// Retired rows are ignored. When a user holds several active access rows for
/// one system, the first one wins.
#[must_use]
pub fn build_rows(
    catalog: &CatalogSnapshot,
    access: &[SystemAccess],
    grants: &[BranchGrant],
) -> Vec<PermissionRow> {
    let mut selected: HashMap<SystemId, PermissionLevelId> = HashMap::new();
    for row in access.iter().filter(|row| row.is_active()) {
        selected
            .entry(row.system_id)
            .or_insert(row.permission_level_id);
    }

    let checked: HashSet<(SystemId, String)> = grants
        .iter()
        .filter(|grant| grant.is_active())
        .map(|grant| (grant.system_id, grant.branch_code.folded()))
        .collect();

    catalog
        .systems()
        .iter()
        .map(|system| {
            let branches = catalog
                .branches()
                .iter()
                .map(|branch| {
                    let check = BranchCheck {
                        name: branch.name.clone(),
                        checked: checked.contains(&(system.id, branch.code.folded())),
                    };
                    (branch.code.clone(), check)
                })
                .collect();

            PermissionRow {
                system_id: system.id,
                system_name: system.name.clone(),
                branches,
                permission_levels: catalog
                    .levels_for(system.id)
                    .iter()
                    .map(LevelOption::from)
                    .collect(),
                selected_permission_level_id: selected
                    .get(&system.id)
                    .copied()
                    .filter(|level| level.is_chosen()),
            }
        })
        .collect()
}

/// Builds edit and blank matrices from a store.
#[derive(Clone)]
pub struct MatrixBuilder {
    store: Arc<dyn AccessStore>,
    catalog: CatalogReader,
}

impl MatrixBuilder {
    pub fn new(store: Arc<dyn AccessStore>, catalog: CatalogReader) -> Self {
        Self { store, catalog }
    }

    /// The current matrix of an active user.
    ///
    /// # Errors
    ///
    /// `AccessError::NotFound` if `user_id` is not an active profile.
    pub async fn edit_matrix(&self, user_id: UserProfileId) -> Result<UserPermissionMatrix> {
        let user = self
            .store
            .find_active_profile(user_id)
            .await?
            .ok_or(AccessError::NotFound(user_id))?;

        let catalog = self.catalog.snapshot().await?;
        let access = self.store.active_system_access(user_id).await?;
        let grants = self.store.active_branch_grants(user_id).await?;

        tracing::debug!(
            user_id = %user_id,
            system_access = access.len(),
            branch_grants = grants.len(),
            "Building edit matrix"
        );

        Ok(UserPermissionMatrix {
            rows: build_rows(&catalog, &access, &grants),
            user: Some(user),
        })
    }

    /// An all-unchecked matrix for a new user.
    pub async fn blank_matrix(&self) -> Result<UserPermissionMatrix> {
        let catalog = self.catalog.snapshot().await?;
        Ok(UserPermissionMatrix {
            user: None,
            rows: build_rows(&catalog, &[], &[]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use keystone_core::status;
    use keystone_db::{Branch, LocalSystem};

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
                    code: BranchCode::new("LA"),
                    name: "Los Angeles".to_string(),
                },
                Branch {
                    code: BranchCode::new("NY"),
                    name: "New York".to_string(),
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
            ],
        )
    }

    fn access(id: i32, system: i32, level: i32, row_status: i32) -> SystemAccess {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        SystemAccess {
            id,
            user_id: UserProfileId::new(1),
            system_id: SystemId::new(system),
            permission_level_id: PermissionLevelId::new(level),
            status: row_status,
            created_at: at,
            created_by: "seed".to_string(),
            modified_at: None,
            modified_by: None,
        }
    }

    fn grant(system: i32, code: &str, row_status: i32) -> BranchGrant {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        BranchGrant {
            id: 1,
            user_id: UserProfileId::new(1),
            system_id: SystemId::new(system),
            branch_code: BranchCode::new(code),
            status: row_status,
            created_at: at,
            created_by: "seed".to_string(),
            modified_at: None,
            modified_by: None,
        }
    }

    #[test]
    fn test_blank_rows_cover_every_system_and_branch() {
        let rows = build_rows(&catalog(), &[], &[]);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.branches.len(), 2);
            assert!(row.branches.values().all(|b| !b.checked));
            assert!(row.selected_permission_level_id.is_none());
        }
        assert_eq!(rows[0].permission_levels.len(), 2);
        assert!(rows[1].permission_levels.is_empty());
    }

    #[test]
    fn test_checked_branch_matches_case_insensitively() {
        let rows = build_rows(
            &catalog(),
            &[access(1, 1, 2, status::ACTIVE)],
            &[grant(1, "ny", status::ACTIVE)],
        );
        let s1 = &rows[0];
        assert_eq!(s1.selected_permission_level_id, Some(PermissionLevelId::new(2)));
        assert!(s1.branches[&BranchCode::new("NY")].checked);
        assert!(!s1.branches[&BranchCode::new("LA")].checked);
        assert!(!rows[1].branches[&BranchCode::new("NY")].checked);
    }

    #[test]
    fn test_first_access_row_wins() {
        let rows = build_rows(
            &catalog(),
            &[access(1, 1, 1, status::ACTIVE), access(2, 1, 2, status::ACTIVE)],
            &[],
        );
        assert_eq!(rows[0].selected_permission_level_id, Some(PermissionLevelId::new(1)));
    }

    #[test]
    fn test_retired_rows_are_ignored() {
        let rows = build_rows(
            &catalog(),
            &[access(1, 1, 2, status::RETIRED)],
            &[grant(1, "NY", status::RETIRED)],
        );
        assert!(rows[0].selected_permission_level_id.is_none());
        assert_eq!(rows[0].checked_branches().count(), 0);
    }
}
