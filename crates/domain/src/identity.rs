use serde::{Deserialize, Serialize};

/// The authenticated user acting on a request or a realtime session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    pub user_id: String,
    pub username: String,
}

impl ActorIdentity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

impl From<&UserProfile> for ActorIdentity {
    fn from(profile: &UserProfile) -> Self {
        ActorIdentity::new(profile.user_id.clone(), profile.name.clone())
    }
}

/// A user reference as it crosses an outward boundary: either just the id, or the
/// resolved profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UserRef {
    Reference { user_id: String },
    Populated(UserProfile),
}

impl UserRef {
    pub fn reference(user_id: impl Into<String>) -> Self {
        UserRef::Reference {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            UserRef::Reference { user_id } => user_id,
            UserRef::Populated(profile) => &profile.user_id,
        }
    }

    /// Display name when populated; falls back to the raw id.
    pub fn display_name(&self) -> &str {
        match self {
            UserRef::Reference { user_id } => user_id,
            UserRef::Populated(profile) => &profile.name,
        }
    }

    pub fn is_populated(&self) -> bool {
        matches!(self, UserRef::Populated(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_ref_serializes_with_explicit_state_tag() {
        let populated = UserRef::Populated(UserProfile {
            user_id: "u-1".to_string(),
            name: "Ayu".to_string(),
            email: "ayu@example.com".to_string(),
        });
        let value = serde_json::to_value(&populated).expect("json");
        assert_eq!(
            value,
            json!({
                "state": "populated",
                "user_id": "u-1",
                "name": "Ayu",
                "email": "ayu@example.com",
            })
        );

        let reference: UserRef =
            serde_json::from_value(json!({ "state": "reference", "user_id": "u-2" }))
                .expect("reference");
        assert_eq!(reference.user_id(), "u-2");
        assert_eq!(reference.display_name(), "u-2");
        assert!(!reference.is_populated());
    }
}
