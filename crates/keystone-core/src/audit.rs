//! Audit stamping.
//!
//! The engine never reads the wall clock or an ambient identity: every
//! mutating call receives an [`AuditStamp`] from its caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who performed a write, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    /// Opaque acting-user string supplied by the caller.
    pub actor: String,
    /// Timestamp recorded on every row touched by the write.
    pub at: DateTime<Utc>,
}

impl AuditStamp {
    /// Create a stamp for `actor` at `at`.
    pub fn new(actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            actor: actor.into(),
            at,
        }
    }
}
