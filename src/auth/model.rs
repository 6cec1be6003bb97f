use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const FALLBACK_DISPLAY_NAME: &str = "User";

/// Identity attached to a session, as returned by the identity service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl SessionUser {
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Resolves the display name: full name, then name, then email, then `"User"`.
    pub fn display_name(&self) -> String {
        self.metadata_str("full_name")
            .or_else(|| self.metadata_str("name"))
            .or_else(|| self.email.as_deref().filter(|email| !email.is_empty()))
            .unwrap_or(FALLBACK_DISPLAY_NAME)
            .to_string()
    }
}

/// An authenticated identity-provider session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: SessionUser,
    /// Access token issued by the upstream OAuth provider (e.g. Google).
    #[serde(default)]
    pub provider_token: Option<String>,
    #[serde(default)]
    pub provider_refresh_token: Option<String>,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn email(&self) -> Option<&str> {
        self.user.email.as_deref()
    }

    pub fn display_name(&self) -> String {
        self.user.display_name()
    }

    /// Fills in provider tokens carried by a redirect when the session lacks them.
    pub fn with_provider_tokens(
        mut self,
        provider_token: Option<&str>,
        provider_refresh_token: Option<&str>,
    ) -> Self {
        if self.provider_token.is_none() {
            self.provider_token = provider_token.map(str::to_string);
        }
        if self.provider_refresh_token.is_none() {
            self.provider_refresh_token = provider_refresh_token.map(str::to_string);
        }
        self
    }
}

/// The persisted projection of the signed-in identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<&Session> for LocalUser {
    fn from(session: &Session) -> Self {
        Self {
            id: session.user.id.clone(),
            email: session.user.email.clone().unwrap_or_default(),
            name: session.display_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(metadata: Value, email: Option<&str>) -> SessionUser {
        SessionUser {
            id: "usr-1".into(),
            email: email.map(str::to_string),
            user_metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        let user = user(json!({"full_name": "Ada Lovelace", "name": "ada"}), Some("ada@example.com"));
        assert_eq!(user.display_name(), "Ada Lovelace");
    }

    #[test]
    fn display_name_falls_back_to_name_then_email() {
        assert_eq!(
            user(json!({"name": "ada"}), Some("ada@example.com")).display_name(),
            "ada"
        );
        assert_eq!(
            user(json!({"full_name": "  "}), Some("ada@example.com")).display_name(),
            "ada@example.com"
        );
    }

    #[test]
    fn display_name_defaults_to_user() {
        assert_eq!(user(json!({}), None).display_name(), "User");
        assert_eq!(user(json!({}), Some("")).display_name(), "User");
    }

    #[test]
    fn session_deserializes_identity_service_payload() {
        let session: Session = serde_json::from_value(json!({
            "access_token": "AT1",
            "refresh_token": "RT1",
            "expires_in": 3600,
            "token_type": "bearer",
            "provider_token": "ya29.provider",
            "user": {
                "id": "usr-1",
                "email": "demo@nexus.com",
                "user_metadata": {"full_name": "Demo User"}
            }
        }))
        .unwrap();

        assert_eq!(session.user_id(), "usr-1");
        assert_eq!(session.provider_token.as_deref(), Some("ya29.provider"));
        assert_eq!(
            LocalUser::from(&session),
            LocalUser {
                id: "usr-1".into(),
                email: "demo@nexus.com".into(),
                name: "Demo User".into(),
            }
        );
    }
}
