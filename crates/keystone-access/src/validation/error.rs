//! Validation error types.

use keystone_core::SystemId;
use serde::Serialize;

/// A single rule violation, naming the field (and system, for matrix rules)
/// that caused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    /// The field name that failed validation, e.g. `email` or `permissions[2]`.
    pub field: String,
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// The offending system, for grant matrix violations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_id: Option<SystemId>,
    /// Optional constraint details (e.g., `max_length`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<serde_json::Value>,
}

impl FieldViolation {
    /// Create a new violation.
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
            system_id: None,
            constraints: None,
        }
    }

    /// Create a violation with constraint details.
    pub fn with_constraints(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        constraints: serde_json::Value,
    ) -> Self {
        Self {
            constraints: Some(constraints),
            ..Self::new(field, code, message)
        }
    }

    /// Attach the system a matrix violation is about.
    #[must_use]
    pub fn for_system(mut self, system_id: SystemId) -> Self {
        self.system_id = Some(system_id);
        self
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_violation_new() {
        let v = FieldViolation::new("domain", "required", "Domain is required");
        assert_eq!(v.field, "domain");
        assert_eq!(v.code, "required");
        assert!(v.system_id.is_none());
        assert!(v.constraints.is_none());
    }

    #[test]
    fn test_serialization_skips_empty_options() {
        let v = FieldViolation::new("email", "invalid_format", "Invalid email format");
        let json = serde_json::to_string(&v).unwrap();
        assert!(!json.contains("system_id"));
        assert!(!json.contains("constraints"));
    }

    #[test]
    fn test_serialization_includes_system() {
        let v = FieldViolation::with_constraints(
            "permissions[0]",
            "branch_required",
            "select a branch",
            json!({"system_id": 4}),
        )
        .for_system(SystemId::new(4));
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"system_id\":4"));
        assert!(json.contains("\"constraints\""));
    }
}
