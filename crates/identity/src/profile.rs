//! Authenticated user profile returned by `/ui/users/me`

use serde::{Deserialize, Serialize};

/// Profile of the signed-in user.
///
/// Only `userName` is required. Fields the console does not interpret are
/// kept in `extra` so callers can still read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_and_keeps_unknown_fields() {
        let json = r#"{"userName":"alice","displayName":"Alice","roles":["developer"],"email":"alice@example.com"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.user_name, "alice");
        assert_eq!(profile.display_name.as_deref(), Some("Alice"));
        assert_eq!(profile.roles, vec!["developer"]);
        assert_eq!(profile.extra["email"], "alice@example.com");
    }

    #[test]
    fn only_user_name_is_required() {
        let profile: UserProfile = serde_json::from_str(r#"{"userName":"bob"}"#).unwrap();
        assert!(profile.display_name.is_none());
        assert!(profile.roles.is_empty());

        assert!(serde_json::from_str::<UserProfile>(r#"{"roles":[]}"#).is_err());
    }
}
