//! Error types for user administration and permission reconciliation.

use keystone_core::UserProfileId;
use keystone_db::{DbError, ACTIVE_DOMAIN_USERNAME_CONSTRAINT, ACTIVE_EMAIL_CONSTRAINT};

use crate::validation::FieldViolation;

/// Error type for the access engine.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// One or more profile fields or grant matrix entries broke a rule.
    /// Raised before any write.
    #[error("Validation failed with {} error(s)", errors.len())]
    Validation {
        /// Every violation found, in input order.
        errors: Vec<FieldViolation>,
    },

    /// Another active profile already holds this (domain, username).
    #[error("Username {domain}\\{username} is already in use")]
    UsernameConflict {
        /// Domain of the conflicting login.
        domain: String,
        /// Username of the conflicting login.
        username: String,
    },

    /// Another active profile already uses this email address.
    #[error("Email already exists")]
    EmailConflict,

    /// No active profile with this id.
    #[error("User profile {0} not found")]
    NotFound(UserProfileId),

    /// The caller cancelled the operation before it committed.
    #[error("Operation cancelled")]
    Cancelled,

    /// Storage failure. The transaction, if any, was rolled back.
    #[error(transparent)]
    Storage(#[from] DbError),
}

impl AccessError {
    /// Build a validation error from collected violations.
    #[must_use]
    pub fn validation(errors: Vec<FieldViolation>) -> Self {
        Self::Validation { errors }
    }

    /// The violations carried by a validation error.
    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            Self::Validation { errors } => errors,
            _ => &[],
        }
    }

    /// Whether this is a username or email conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UsernameConflict { .. } | Self::EmailConflict)
    }

    /// Map a storage error raised while writing `domain\username`, turning
    /// unique index violations into the matching conflict.
    pub(crate) fn from_profile_write(err: DbError, domain: &str, username: &str) -> Self {
        match err.unique_constraint() {
            Some(ACTIVE_DOMAIN_USERNAME_CONSTRAINT) => Self::UsernameConflict {
                domain: domain.to_string(),
                username: username.to_string(),
            },
            Some(ACTIVE_EMAIL_CONSTRAINT) => Self::EmailConflict,
            _ => Self::Storage(err),
        }
    }
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_conflict_display() {
        let err = AccessError::UsernameConflict {
            domain: "ACME".to_string(),
            username: "jdoe".to_string(),
        };
        assert_eq!(err.to_string(), "Username ACME\\jdoe is already in use");
        assert!(err.is_conflict());
    }

    #[test]
    fn test_validation_display_counts_errors() {
        let err = AccessError::validation(vec![
            FieldViolation::new("domain", "required", "Domain is required"),
            FieldViolation::new("username", "required", "Username is required"),
        ]);
        assert_eq!(err.to_string(), "Validation failed with 2 error(s)");
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_unique_index_maps_to_conflict() {
        let err = AccessError::from_profile_write(
            DbError::UniqueViolation {
                constraint: ACTIVE_DOMAIN_USERNAME_CONSTRAINT.to_string(),
            },
            "ACME",
            "jdoe",
        );
        assert!(matches!(err, AccessError::UsernameConflict { .. }));

        let err = AccessError::from_profile_write(
            DbError::UniqueViolation {
                constraint: ACTIVE_EMAIL_CONSTRAINT.to_string(),
            },
            "ACME",
            "jdoe",
        );
        assert!(matches!(err, AccessError::EmailConflict));
    }

    #[test]
    fn test_other_storage_errors_pass_through() {
        let err = AccessError::from_profile_write(
            DbError::Unavailable("down".to_string()),
            "ACME",
            "jdoe",
        );
        assert!(matches!(err, AccessError::Storage(DbError::Unavailable(_))));
        assert!(!err.is_conflict());
    }
}
