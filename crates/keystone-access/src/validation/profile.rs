//! Profile field validation.
//!
//! Domain, first name, last name and username are required. Usernames are
//! directory logins and carry no format rule beyond that. Email is optional
//! but must be well formed when present.

use keystone_db::ProfileFields;
use serde_json::json;

use super::email::validate_email;
use super::error::FieldViolation;

/// Maximum length of domain, name and username fields.
const MAX_NAME_LENGTH: usize = 150;

fn required_text(field: &str, label: &str, value: &str, errors: &mut Vec<FieldViolation>) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldViolation::new(
            field,
            "required",
            format!("{label} is required"),
        ));
    } else if value.chars().count() > MAX_NAME_LENGTH {
        errors.push(FieldViolation::with_constraints(
            field,
            "too_long",
            format!("{label} must not exceed {MAX_NAME_LENGTH} characters"),
            json!({"max_length": MAX_NAME_LENGTH}),
        ));
    }
}

/// Validate every profile field and collect all violations.
#[must_use]
pub fn validate_profile_fields(fields: &ProfileFields) -> Vec<FieldViolation> {
    let mut errors = Vec::new();

    required_text("domain", "Domain", &fields.domain, &mut errors);
    required_text("first_name", "First name", &fields.first_name, &mut errors);
    required_text("last_name", "Last name", &fields.last_name, &mut errors);

    required_text("username", "Username", &fields.username, &mut errors);

    if !fields.email.trim().is_empty() {
        if let Err(err) = validate_email(&fields.email) {
            errors.push(err);
        }
    }

    errors
}
