//! Subcommand implementations.

pub mod catalog;
pub mod migrate;
pub mod users;

use std::sync::Arc;

use chrono::Utc;
use keystone_access::{PgAccessStore, UserAdminService};
use keystone_core::AuditStamp;
use keystone_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// What every data command needs.
pub struct AppContext {
    pub service: UserAdminService,
    pub actor: String,
    pub cancel: CancellationToken,
}

impl AppContext {
    pub fn new(
        pool: DbPool,
        config: &Config,
        actor: Option<String>,
        cancel: CancellationToken,
    ) -> Self {
        let store = Arc::new(PgAccessStore::new(pool));
        let service = UserAdminService::new(store).with_options(config.reconcile);
        let actor = actor.unwrap_or_else(|| config.actor.clone());
        tracing::debug!(actor = %actor, lock = %service.options().lock, "Admin context ready");
        Self {
            service,
            actor,
            cancel,
        }
    }

    /// Stamp for a write issued now.
    pub fn stamp(&self) -> AuditStamp {
        AuditStamp::new(self.actor.clone(), Utc::now())
    }
}
