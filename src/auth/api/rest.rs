use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::token::{exchange_pkce_code, fetch_user, logout, refresh_session};
use super::{IdentityProvider, SessionCache};
use crate::app::NexusApp;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::model::Session;
use crate::auth::oauth::RedirectPersistence;

/// Identity provider backed by the hosted `/auth/v1` REST API.
///
/// Established sessions are cached in process. The PKCE verifier for a code
/// exchange is read from the redirect persistence written before leaving for
/// the provider. In the browser that persistence defaults to `sessionStorage`,
/// so the verifier survives the page load.
pub struct RestIdentityProvider {
    app: NexusApp,
    client: Client,
    cache: SessionCache,
    redirect_persistence: Arc<dyn RedirectPersistence>,
}

impl RestIdentityProvider {
    pub fn new(app: NexusApp) -> Self {
        Self {
            app,
            client: Client::new(),
            cache: SessionCache::default(),
            redirect_persistence: default_redirect_persistence(),
        }
    }

    /// Uses `persistence` to look up PKCE verifiers, typically one that survives reloads.
    pub fn with_redirect_persistence(mut self, persistence: Arc<dyn RedirectPersistence>) -> Self {
        self.redirect_persistence = persistence;
        self
    }

    pub fn app(&self) -> &NexusApp {
        &self.app
    }

    pub fn redirect_persistence(&self) -> Arc<dyn RedirectPersistence> {
        self.redirect_persistence.clone()
    }

    /// Trades the cached session's refresh token for a new session.
    pub async fn refresh(&self) -> AuthResult<Session> {
        let current = self.cache.current().ok_or(AuthError::NoCredentialFound)?;
        if current.refresh_token.is_empty() {
            return Err(AuthError::SessionEstablishFailed(
                "Session has no refresh token".into(),
            ));
        }
        let refreshed = refresh_session(&self.client, &self.app, &current.refresh_token)
            .await?
            .with_provider_tokens(
                current.provider_token.as_deref(),
                current.provider_refresh_token.as_deref(),
            );
        self.cache.store(refreshed.clone());
        Ok(refreshed)
    }
}

#[cfg(not(all(feature = "wasm-web", target_arch = "wasm32")))]
fn default_redirect_persistence() -> Arc<dyn RedirectPersistence> {
    crate::auth::oauth::InMemoryRedirectPersistence::shared()
}

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
fn default_redirect_persistence() -> Arc<dyn RedirectPersistence> {
    crate::auth::persistence::WebStorageRedirectPersistence::shared()
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl IdentityProvider for RestIdentityProvider {
    async fn exchange_code_for_session(&self, code: &str) -> AuthResult<Session> {
        let verifier = self
            .redirect_persistence
            .take()?
            .and_then(|pending| pending.code_verifier)
            .ok_or_else(|| {
                AuthError::CodeExchangeFailed("No code verifier recorded for this redirect".into())
            })?;

        let session = exchange_pkce_code(&self.client, &self.app, code, &verifier).await?;
        log::debug!("exchanged authorization code for user {}", session.user_id());
        self.cache.store(session.clone());
        Ok(session)
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> AuthResult<Session> {
        let session = match fetch_user(&self.client, &self.app, access_token).await {
            Ok(user) => Session {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                expires_in: None,
                user,
                provider_token: None,
                provider_refresh_token: None,
            },
            Err(AuthError::SessionEstablishFailed(reason)) if !refresh_token.is_empty() => {
                log::debug!("access token rejected ({reason}); trying refresh token");
                refresh_session(&self.client, &self.app, refresh_token).await?
            }
            Err(err) => return Err(err),
        };

        self.cache.store(session.clone());
        Ok(session)
    }

    async fn get_session(&self) -> AuthResult<Option<Session>> {
        Ok(self.cache.current())
    }

    async fn wait_for_session(&self, settle: Duration) -> AuthResult<Option<Session>> {
        Ok(self.cache.wait(settle).await)
    }

    async fn attach_provider_tokens(
        &self,
        provider_token: Option<&str>,
        provider_refresh_token: Option<&str>,
    ) -> AuthResult<Option<Session>> {
        Ok(self
            .cache
            .attach_provider_tokens(provider_token, provider_refresh_token))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let Some(session) = self.cache.current() else {
            return Ok(());
        };
        self.cache.clear();
        if let Err(err) = logout(&self.client, &self.app, &session.access_token).await {
            log::warn!("remote sign-out failed: {err}");
        }
        Ok(())
    }
}
