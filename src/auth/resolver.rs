use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::auth::api::IdentityProvider;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::model::Session;
use crate::auth::redirect::ParsedCredentialFields;

/// Which rule produced the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionPath {
    TokenPair,
    AccessTokenOnly,
    CodeExchange,
    ExistingSession,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub session: Session,
    pub path: ResolutionPath,
}

/// Turns parsed redirect fields into an authenticated session.
///
/// Rules are applied in a fixed order: provider error, token pair, lone access
/// token, authorization code, existing session. The first rule that yields a
/// session wins. Calls on one resolver never overlap, and an authorization
/// code is sent to the identity provider at most once.
pub struct SessionResolver {
    identity: Arc<dyn IdentityProvider>,
    exchanged_codes: Mutex<HashSet<String>>,
    serial: async_lock::Mutex<()>,
}

impl SessionResolver {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            exchanged_codes: Mutex::new(HashSet::new()),
            serial: async_lock::Mutex::new(()),
        }
    }

    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        self.identity.clone()
    }

    pub async fn resolve(&self, fields: &ParsedCredentialFields) -> AuthResult<Resolution> {
        let _serial = self.serial.lock().await;
        let mut resolution = self.resolve_serialized(fields).await?;

        let provider_token = fields.provider_token.as_deref().filter(|t| !t.is_empty());
        let provider_refresh_token = fields
            .provider_refresh_token
            .as_deref()
            .filter(|t| !t.is_empty());
        if provider_token.is_none() && provider_refresh_token.is_none() {
            return Ok(resolution);
        }

        // The redirect's provider tokens are newer than anything already held.
        match self
            .identity
            .attach_provider_tokens(provider_token, provider_refresh_token)
            .await
        {
            Ok(Some(session)) => resolution.session = session,
            Ok(None) => {
                if let Some(token) = provider_token {
                    resolution.session.provider_token = Some(token.to_string());
                }
                if let Some(token) = provider_refresh_token {
                    resolution.session.provider_refresh_token = Some(token.to_string());
                }
            }
            Err(err) => return Err(into_session_error(err)),
        }
        Ok(resolution)
    }

    async fn resolve_serialized(&self, fields: &ParsedCredentialFields) -> AuthResult<Resolution> {
        if fields.has_error() {
            let message = fields
                .error_description
                .clone()
                .or_else(|| fields.error_code.clone())
                .unwrap_or_default();
            log::info!("provider returned an error to the redirect");
            return Err(AuthError::ProviderDenied(message));
        }

        let access_token = fields.access_token.as_deref().filter(|t| !t.is_empty());
        let refresh_token = fields.refresh_token.as_deref().filter(|t| !t.is_empty());

        match (access_token, refresh_token) {
            (Some(access), Some(refresh)) => {
                let session = self
                    .identity
                    .set_session(access, refresh)
                    .await
                    .map_err(into_session_error)?;
                return Ok(Resolution {
                    session,
                    path: ResolutionPath::TokenPair,
                });
            }
            (Some(access), None) => match self.identity.set_session(access, "").await {
                Ok(session) => {
                    return Ok(Resolution {
                        session,
                        path: ResolutionPath::AccessTokenOnly,
                    })
                }
                Err(err) => log::debug!("lone access token rejected: {err}"),
            },
            _ => {}
        }

        if let Some(code) = fields.authorization_code.as_deref().filter(|c| !c.is_empty()) {
            return self.exchange_once(code).await.map(|session| Resolution {
                session,
                path: ResolutionPath::CodeExchange,
            });
        }

        match self.identity.get_session().await? {
            Some(session) => Ok(Resolution {
                session,
                path: ResolutionPath::ExistingSession,
            }),
            None => Err(AuthError::NoCredentialFound),
        }
    }

    async fn exchange_once(&self, code: &str) -> AuthResult<Session> {
        let first_use = self.exchanged_codes.lock().unwrap().insert(code.to_string());
        if !first_use {
            return Err(AuthError::CodeExchangeFailed(
                "Authorization code was already used".into(),
            ));
        }

        self.identity
            .exchange_code_for_session(code)
            .await
            .map_err(|err| match err {
                AuthError::CodeExchangeFailed(_) | AuthError::Network(_) => err,
                other => AuthError::CodeExchangeFailed(other.to_string()),
            })
    }
}

fn into_session_error(err: AuthError) -> AuthError {
    match err {
        AuthError::SessionEstablishFailed(_) | AuthError::Network(_) => err,
        other => AuthError::SessionEstablishFailed(other.to_string()),
    }
}
