use std::fmt;

use crate::auth::AuthError;
use crate::integrations::model::IntegrationProvider;

pub type IntegrationResult<T> = Result<T, IntegrationError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    /// The inventory API refused the request, usually a missing scope or a stale token.
    ProviderApi { status: u16, body: String },
    Network(String),
    /// The remote data store rejected a read or write.
    Persistence(String),
    /// The token-capture redirect did not name a project.
    MissingProjectId,
    /// No upstream provider token is available for the current user.
    NoProviderToken,
    /// The provider is listed but cannot be linked yet.
    NotAvailable(IntegrationProvider),
    NotFound(String),
    /// A link was confirmed before any property was picked.
    NoPropertySelected,
    Auth(AuthError),
}

impl IntegrationError {
    /// Whether asking the user for consent again may fix the failure.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            IntegrationError::ProviderApi { .. } | IntegrationError::NoProviderToken
        )
    }

    /// Text shown to the user when a flow fails.
    pub fn user_message(&self) -> String {
        match self {
            IntegrationError::MissingProjectId => "Project ID not found".to_string(),
            IntegrationError::NoProviderToken => {
                "Access token not found. Please sign in again to renew Google permissions."
                    .to_string()
            }
            IntegrationError::NotAvailable(provider) => {
                format!("{} integration is under development", provider.display_name())
            }
            IntegrationError::ProviderApi { .. } => {
                "Failed to fetch Google Analytics properties".to_string()
            }
            IntegrationError::Persistence(_) => "Failed to save integration".to_string(),
            IntegrationError::NoPropertySelected => "Select a property first".to_string(),
            IntegrationError::Auth(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrationError::ProviderApi { status, body } => {
                write!(f, "Provider API request failed ({status}): {body}")
            }
            IntegrationError::Network(message) => write!(f, "Network error: {message}"),
            IntegrationError::Persistence(message) => {
                write!(f, "Integration store error: {message}")
            }
            IntegrationError::MissingProjectId => write!(f, "Redirect is missing the project id"),
            IntegrationError::NoProviderToken => write!(f, "No provider access token available"),
            IntegrationError::NotAvailable(provider) => {
                write!(f, "Provider {} is not available yet", provider.as_str())
            }
            IntegrationError::NotFound(id) => write!(f, "Integration {id} was not found"),
            IntegrationError::NoPropertySelected => write!(f, "No property selected"),
            IntegrationError::Auth(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for IntegrationError {}

impl From<AuthError> for IntegrationError {
    fn from(error: AuthError) -> Self {
        IntegrationError::Auth(error)
    }
}
