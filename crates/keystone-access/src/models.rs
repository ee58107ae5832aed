//! Request and projection types for user administration.

use chrono::{DateTime, Utc};
use keystone_core::UserProfileId;
use keystone_db::{ProfileFields, UserProfile};
use serde::{Deserialize, Serialize};

use crate::reconcile::SystemSelection;

/// Create a user with an initial grant matrix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub profile: ProfileFields,
    #[serde(default)]
    pub permissions: Vec<SystemSelection>,
}

/// Replace a user's grant matrix and optionally their profile fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    /// New profile fields. `None` leaves them unchanged.
    #[serde(default)]
    pub profile: Option<ProfileFields>,
    /// The complete proposed matrix. Systems left out lose their grants.
    #[serde(default)]
    pub permissions: Vec<SystemSelection>,
}

/// Profile projection without audit columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserProfileId,
    pub domain: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub operator_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl UserSummary {
    /// `DOMAIN\username`.
    #[must_use]
    pub fn login(&self) -> String {
        format!("{}\\{}", self.domain, self.username)
    }
}

impl From<UserProfile> for UserSummary {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            domain: profile.domain,
            first_name: profile.first_name,
            last_name: profile.last_name,
            username: profile.username,
            email: profile.email,
            is_admin: profile.is_admin,
            operator_id: profile.operator_id,
            created_at: profile.created_at,
            modified_at: profile.modified_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_defaults() {
        let request: UpdateUserRequest = serde_json::from_str("{}").unwrap();
        assert!(request.profile.is_none());
        assert!(request.permissions.is_empty());
    }

    #[test]
    fn test_create_request_from_json() {
        let request: CreateUserRequest = serde_json::from_str(
            r#"{
                "profile": {
                    "domain": "ACME",
                    "first_name": "Jane",
                    "last_name": "Doe",
                    "username": "jdoe"
                },
                "permissions": [
                    {
                        "system_id": 1,
                        "permission_level_id": 2,
                        "branches": {"NY": {"checked": true}, "LA": {"checked": false}}
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(request.profile.email, "");
        assert_eq!(request.permissions.len(), 1);
        assert_eq!(request.permissions[0].checked_branches().count(), 1);
    }
}
