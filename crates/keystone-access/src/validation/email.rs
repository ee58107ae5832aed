//! Email validation following RFC 5322.
//!
//! Validates email addresses using a regex pattern that handles:
//! - Standard email addresses (user@example.com)
//! - Plus addressing (user+tag@example.com)
//! - Subdomains (user@mail.example.com)

use super::error::FieldViolation;
use serde_json::json;
use std::sync::LazyLock;

/// RFC 5322 compliant email regex pattern.
static EMAIL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$"
    ).expect("EMAIL_REGEX is a valid regex pattern")
});

/// Maximum allowed email length (column width of `user_profiles.email`).
pub const MAX_EMAIL_LENGTH: usize = 250;

/// Minimum reasonable email length (a@b.c).
const MIN_EMAIL_LENGTH: usize = 5;

/// Validate a non-empty email address.
///
/// Profiles may omit the email entirely; callers skip this check for an empty
/// value.
///
/// # Examples
///
/// ```
/// use keystone_access::validation::validate_email;
///
/// assert!(validate_email("user@example.com").is_ok());
/// assert!(validate_email("user+tag@example.com").is_ok());
///
/// assert!(validate_email("invalid-email").is_err());
/// assert!(validate_email("@example.com").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), FieldViolation> {
    let email = email.trim();

    if email.is_empty() {
        return Err(FieldViolation::new("email", "required", "Email is required"));
    }

    if email.len() < MIN_EMAIL_LENGTH {
        return Err(FieldViolation::with_constraints(
            "email",
            "too_short",
            format!("Email must be at least {MIN_EMAIL_LENGTH} characters"),
            json!({"min_length": MIN_EMAIL_LENGTH, "actual": email.len()}),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(FieldViolation::with_constraints(
            "email",
            "too_long",
            format!("Email must not exceed {MAX_EMAIL_LENGTH} characters"),
            json!({"max_length": MAX_EMAIL_LENGTH, "actual": email.len()}),
        ));
    }

    if !email.contains('@') {
        return Err(FieldViolation::new(
            "email",
            "invalid_format",
            "Email must contain an @ symbol",
        ));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(FieldViolation::new(
            "email",
            "invalid_format",
            "Invalid email format",
        ));
    }

    Ok(())
}
