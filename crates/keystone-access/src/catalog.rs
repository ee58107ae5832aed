//! Catalog reader: read-only access to domains, branches, systems and
//! permission levels.

use std::collections::HashMap;
use std::sync::Arc;

use keystone_core::{BranchCode, PermissionLevelId, SystemId};
use keystone_db::{Branch, Domain, LocalSystem, PermissionLevel};

use crate::error::Result;
use crate::store::CatalogStore;

/// Service for reading the reference catalog.
#[derive(Clone)]
pub struct CatalogReader {
    store: Arc<dyn CatalogStore>,
}

impl CatalogReader {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// All domains ordered by name.
    pub async fn list_domains(&self) -> Result<Vec<Domain>> {
        Ok(self.store.list_domains().await?)
    }

    /// All branches ordered by name.
    pub async fn list_branches(&self) -> Result<Vec<Branch>> {
        Ok(self.store.list_branches().await?)
    }

    /// All systems ordered by name.
    pub async fn list_systems(&self) -> Result<Vec<LocalSystem>> {
        Ok(self.store.list_systems().await?)
    }

    /// Permission levels valid for one system, ordered by name.
    pub async fn list_permission_levels(
        &self,
        system_id: SystemId,
    ) -> Result<Vec<PermissionLevel>> {
        Ok(self.store.list_permission_levels(system_id).await?)
    }

    /// Read systems, branches and every permission level in one bulk read each.
    pub async fn snapshot(&self) -> Result<CatalogSnapshot> {
        let systems = self.store.list_systems().await?;
        let branches = self.store.list_branches().await?;
        let levels = self.store.list_all_permission_levels().await?;

        tracing::debug!(
            systems = systems.len(),
            branches = branches.len(),
            permission_levels = levels.len(),
            "Catalog snapshot loaded"
        );

        Ok(CatalogSnapshot::new(systems, branches, levels))
    }
}

/// In-memory view of the catalog with constant-time lookups.
///
/// Systems and branches keep the name order they were read in.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    systems: Vec<LocalSystem>,
    branches: Vec<Branch>,
    levels_by_system: HashMap<SystemId, Vec<PermissionLevel>>,
    system_index: HashMap<SystemId, usize>,
    branch_index: HashMap<String, usize>,
}

impl CatalogSnapshot {
    #[must_use]
    pub fn new(
        systems: Vec<LocalSystem>,
        branches: Vec<Branch>,
        levels: Vec<PermissionLevel>,
    ) -> Self {
        let system_index = systems
            .iter()
            .enumerate()
            .map(|(idx, system)| (system.id, idx))
            .collect();
        let branch_index = branches
            .iter()
            .enumerate()
            .map(|(idx, branch)| (branch.code.folded(), idx))
            .collect();

        let mut levels_by_system: HashMap<SystemId, Vec<PermissionLevel>> = HashMap::new();
        for level in levels {
            levels_by_system
                .entry(level.system_id)
                .or_default()
                .push(level);
        }
        for levels in levels_by_system.values_mut() {
            levels.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        }

        Self {
            systems,
            branches,
            levels_by_system,
            system_index,
            branch_index,
        }
    }

    #[must_use]
    pub fn systems(&self) -> &[LocalSystem] {
        &self.systems
    }

    #[must_use]
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    #[must_use]
    pub fn system(&self, id: SystemId) -> Option<&LocalSystem> {
        self.system_index.get(&id).map(|&idx| &self.systems[idx])
    }

    /// Levels offered by a system; empty for unknown systems.
    #[must_use]
    pub fn levels_for(&self, system_id: SystemId) -> &[PermissionLevel] {
        self.levels_by_system
            .get(&system_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn level_belongs_to(&self, level_id: PermissionLevelId, system_id: SystemId) -> bool {
        self.levels_for(system_id).iter().any(|l| l.id == level_id)
    }

    /// Case-insensitive branch lookup.
    #[must_use]
    pub fn branch(&self, code: &BranchCode) -> Option<&Branch> {
        self.branch_index
            .get(&code.folded())
            .map(|&idx| &self.branches[idx])
    }
}
