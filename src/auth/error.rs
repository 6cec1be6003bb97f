use crate::app::AppError;
use std::fmt;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The user or the provider refused consent.
    ProviderDenied(String),
    /// The identity provider rejected an access/refresh token pair.
    SessionEstablishFailed(String),
    /// The authorization code was invalid, expired or already used.
    CodeExchangeFailed(String),
    /// Nothing usable in the redirect and no live session.
    NoCredentialFound,
    Network(String),
    InvalidCredential(String),
    /// The local identity store rejected a read or write.
    Persistence(String),
    App(AppError),
    NotImplemented(&'static str),
}

impl AuthError {
    /// Text shown to the user when a callback flow fails.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::ProviderDenied(message) => message.clone(),
            AuthError::NoCredentialFound => "No authentication code received".to_string(),
            AuthError::SessionEstablishFailed(_)
            | AuthError::CodeExchangeFailed(_)
            | AuthError::InvalidCredential(_) => "Authentication failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::ProviderDenied(message) => write!(f, "Provider denied access: {message}"),
            AuthError::SessionEstablishFailed(message) => {
                write!(f, "Failed to establish session: {message}")
            }
            AuthError::CodeExchangeFailed(message) => {
                write!(f, "Authorization code exchange failed: {message}")
            }
            AuthError::NoCredentialFound => write!(f, "No credential found in redirect or session"),
            AuthError::Network(message) => write!(f, "Network error: {message}"),
            AuthError::InvalidCredential(message) => write!(f, "Invalid credential: {message}"),
            AuthError::Persistence(message) => write!(f, "Persistence error: {message}"),
            AuthError::App(err) => write!(f, "{err}"),
            AuthError::NotImplemented(feature) => write!(f, "{feature} is not implemented"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AppError> for AuthError {
    fn from(error: AppError) -> Self {
        AuthError::App(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_denied_shows_description_verbatim() {
        let err = AuthError::ProviderDenied("User cancelled".into());
        assert_eq!(err.user_message(), "User cancelled");
    }

    #[test]
    fn exchange_failures_hide_provider_details() {
        let err = AuthError::CodeExchangeFailed("invalid_grant: code reused".into());
        assert_eq!(err.user_message(), "Authentication failed");
        assert!(err.to_string().contains("code reused"));
    }
}
