use serde::{Deserialize, Deserializer, Serialize};

use condo_core::{DomainError, DomainResult, SubjectId};

use crate::Role;

/// User data as returned by the session-check and login endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: SubjectId,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Deserialize an optional user payload, treating malformed data as absent.
///
/// A profile that fails to decode is "no usable user data"; the session
/// store then stays anonymous instead of holding a half-built principal.
pub fn lenient_profile<'de, D>(deserializer: D) -> Result<Option<UserProfile>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match serde_json::from_value::<UserProfile>(value) {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::warn!(error = %e, "discarding malformed user profile");
            None
        }
    }))
}

/// Identity of the authenticated user.
///
/// Built atomically from a [`UserProfile`]; the role label is translated
/// once here and the raw text is kept only for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    subject_id: SubjectId,
    email: String,
    display_name: String,
    avatar_url: Option<String>,
    role_label: String,
    role: Role,
}

impl Principal {
    pub fn from_profile(profile: UserProfile) -> DomainResult<Self> {
        let email = profile.email.trim().to_string();
        if email.is_empty() {
            return Err(DomainError::validation("principal email is empty"));
        }

        let display_name = profile
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email.clone());

        Ok(Self {
            subject_id: profile.id,
            role: Role::from_label(&profile.role),
            role_label: profile.role,
            avatar_url: profile.avatar.filter(|a| !a.trim().is_empty()),
            display_name,
            email,
        })
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    /// Role text exactly as the backend sent it.
    pub fn role_label(&self) -> &str {
        &self.role_label
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Envelope {
        #[serde(default, deserialize_with = "lenient_profile")]
        user: Option<UserProfile>,
    }

    #[test]
    fn principal_from_full_profile() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": 7,
            "email": "sindico@example.com",
            "role": "Condomínio",
            "name": "Ana Souza",
            "avatar": "https://cdn.example.com/a.png"
        }))
        .unwrap();

        let principal = Principal::from_profile(profile).unwrap();
        assert_eq!(principal.subject_id().as_str(), "7");
        assert_eq!(principal.role(), Role::Condominium);
        assert_eq!(principal.role_label(), "Condomínio");
        assert_eq!(principal.display_name(), "Ana Souza");
        assert_eq!(principal.avatar_url(), Some("https://cdn.example.com/a.png"));
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let profile = UserProfile {
            id: SubjectId::new("u-1").unwrap(),
            email: "morador@example.com".into(),
            role: "morador".into(),
            name: Some("  ".into()),
            avatar: Some(String::new()),
        };

        let principal = Principal::from_profile(profile).unwrap();
        assert_eq!(principal.display_name(), "morador@example.com");
        assert_eq!(principal.avatar_url(), None);
    }

    #[test]
    fn blank_email_is_rejected() {
        let profile = UserProfile {
            id: SubjectId::new("u-1").unwrap(),
            email: " ".into(),
            role: "morador".into(),
            name: None,
            avatar: None,
        };
        assert!(Principal::from_profile(profile).is_err());
    }

    #[test]
    fn malformed_user_payload_reads_as_absent() {
        let env: Envelope = serde_json::from_value(json!({ "user": { "email": "x@y.z" } })).unwrap();
        assert!(env.user.is_none());

        let env: Envelope = serde_json::from_value(json!({})).unwrap();
        assert!(env.user.is_none());

        let env: Envelope = serde_json::from_value(json!({ "user": null })).unwrap();
        assert!(env.user.is_none());
    }
}
