//! Strongly Typed Identifiers
//!
//! Every table in keystone uses a 32-bit surrogate key. Wrapping each one in its
//! own newtype keeps a `SystemId` from being passed where a `PermissionLevelId`
//! is expected, which matters a lot in the grant matrix where all three id
//! kinds travel together.
//!
//! # Example
//!
//! ```
//! use keystone_core::{SystemId, PermissionLevelId};
//!
//! let system = SystemId::new(3);
//! let level = PermissionLevelId::new(2);
//!
//! fn requires_system(id: SystemId) -> i32 {
//!     id.get()
//! }
//!
//! assert_eq!(requires_system(system), 3);
//! // requires_system(level); // This would not compile!
//! # let _ = level;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying integer parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed integer ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wraps a raw key value.
            #[must_use]
            pub const fn new(value: i32) -> Self {
                Self(value)
            }

            /// Returns the raw key value.
            #[must_use]
            pub const fn get(self) -> i32 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.trim()
                    .parse::<i32>()
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }
    };
}

define_id!(
    /// Identifier of a user profile.
    UserProfileId
);

define_id!(
    /// Identifier of a local system (an application users are granted into).
    SystemId
);

define_id!(
    /// Identifier of a permission level. Levels belong to exactly one system.
    ///
    /// Callers use `0` (or any non-positive value) to mean "no level chosen";
    /// see [`PermissionLevelId::is_chosen`].
    PermissionLevelId
);

define_id!(
    /// Identifier of an organisational domain.
    DomainId
);

impl PermissionLevelId {
    /// Whether this id denotes an actual selection rather than the "none" value.
    #[must_use]
    pub const fn is_chosen(self) -> bool {
        self.0 > 0
    }
}

/// Primary key of a branch. Stored trimmed; looked up in the catalog
/// case-insensitively via [`BranchCode::folded`].
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct BranchCode(String);

impl BranchCode {
    /// Create a branch code, trimming surrounding whitespace.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_string())
    }

    /// The code as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded form used as a lookup key.
    #[must_use]
    pub fn folded(&self) -> String {
        self.0.trim().to_lowercase()
    }
}

impl Display for BranchCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for BranchCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for BranchCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod integer_id_tests {
        use super::*;

        #[test]
        fn test_display_returns_raw_value() {
            assert_eq!(UserProfileId::new(42).to_string(), "42");
        }

        #[test]
        fn test_display_honours_width() {
            assert_eq!(format!("{:<4}|", SystemId::new(7)), "7   |");
        }

        #[test]
        fn test_parse_trims_whitespace() {
            let id: SystemId = " 7 ".parse().unwrap();
            assert_eq!(id, SystemId::new(7));
        }

        #[test]
        fn test_parse_error_names_type() {
            let err = "abc".parse::<UserProfileId>().unwrap_err();
            assert_eq!(err.id_type, "UserProfileId");
            assert!(err.to_string().starts_with("Failed to parse UserProfileId"));
        }

        #[test]
        fn test_serializes_transparently() {
            let json = serde_json::to_string(&PermissionLevelId::new(2)).unwrap();
            assert_eq!(json, "2");
            let back: PermissionLevelId = serde_json::from_str("2").unwrap();
            assert_eq!(back, PermissionLevelId::new(2));
        }

        #[test]
        fn test_zero_level_is_not_chosen() {
            assert!(!PermissionLevelId::new(0).is_chosen());
            assert!(!PermissionLevelId::new(-1).is_chosen());
            assert!(PermissionLevelId::new(1).is_chosen());
        }
    }

    mod branch_code_tests {
        use super::*;

        #[test]
        fn test_new_trims() {
            assert_eq!(BranchCode::new("  NY ").as_str(), "NY");
        }

        #[test]
        fn test_folded_is_lowercase() {
            assert_eq!(BranchCode::new("LoN").folded(), "lon");
        }

        #[test]
        fn test_folded_agrees_across_case() {
            assert_eq!(BranchCode::new(" ny ").folded(), BranchCode::new("NY").folded());
            assert_eq!(BranchCode::new("ÉVRY").folded(), BranchCode::new("évry").folded());
            assert_ne!(BranchCode::new("NY").folded(), BranchCode::new("LA").folded());
        }
    }
}
