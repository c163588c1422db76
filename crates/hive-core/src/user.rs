use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Public user profile. Credential material never appears here.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub created_at: String,
}

/// Authenticated caller, derived from a verified credential.
/// Immutable for the duration of a call or stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user() -> User {
        User {
            id: UserId::from_raw("user_1"),
            email: "ada@example.com".into(),
            username: "ada".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            created_at: "2026-03-01T10:00:00.000Z".into(),
        }
    }

    #[test]
    fn identity_from_user() {
        let identity = Identity::from(&make_user());
        assert_eq!(identity.user_id.as_str(), "user_1");
        assert_eq!(identity.username, "ada");
    }

    #[test]
    fn user_wire_shape() {
        let json = serde_json::to_value(make_user()).unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["email"], "ada@example.com");
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn user_deserialize_with_missing_names() {
        let json = r#"{
            "id": "user_2",
            "email": "b@example.com",
            "username": "bea",
            "createdAt": "2026-03-01T10:00:00Z"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(user.first_name.is_empty());
        assert!(user.last_name.is_empty());
    }
}
