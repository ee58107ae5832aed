//! Input validation for profile fields.

mod email;
mod error;
mod profile;

pub use email::{validate_email, MAX_EMAIL_LENGTH};
pub use error::FieldViolation;
pub use profile::validate_profile_fields;
