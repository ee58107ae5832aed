//! Record status semantics shared by every soft-deletable table.
//!
//! Rows are never physically removed. A non-negative status is an active row
//! (tiers above zero are reserved); a negative status marks the row retired.

/// Status given to newly inserted rows.
pub const ACTIVE: i32 = 0;

/// Status written when a row is soft-deleted or superseded.
pub const RETIRED: i32 = -1;

/// Whether a row with this status is visible to active-state queries.
#[must_use]
pub const fn is_active(status: i32) -> bool {
    status >= 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_tiers() {
        assert!(is_active(ACTIVE));
        assert!(is_active(3));
        assert!(!is_active(RETIRED));
    }
}
