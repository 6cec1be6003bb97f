use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{IdentityProvider, SessionCache};
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::model::{Session, SessionUser};

/// Identity provider that keeps codes, tokens and the session in process.
///
/// Authorization codes are single-use: a redeemed code is forgotten.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    codes: Mutex<HashMap<String, Session>>,
    tokens: Mutex<HashMap<String, SessionUser>>,
    cache: SessionCache,
    exchange_calls: AtomicUsize,
    set_session_calls: AtomicUsize,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `code` redeemable once for `session`.
    pub fn register_code(&self, code: impl Into<String>, session: Session) {
        self.codes.lock().unwrap().insert(code.into(), session);
    }

    /// Accepts `access_token` in [`IdentityProvider::set_session`] as belonging to `user`.
    pub fn register_access_token(&self, access_token: impl Into<String>, user: SessionUser) {
        self.tokens.lock().unwrap().insert(access_token.into(), user);
    }

    /// Stores a session as if the provider had detected it on its own.
    pub fn publish_session(&self, session: Session) {
        self.cache.store(session);
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn set_session_calls(&self) -> usize {
        self.set_session_calls.load(Ordering::SeqCst)
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn exchange_code_for_session(&self, code: &str) -> AuthResult<Session> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        let session = self.codes.lock().unwrap().remove(code).ok_or_else(|| {
            AuthError::CodeExchangeFailed("invalid flow state, no valid flow state found".into())
        })?;
        self.cache.store(session.clone());
        Ok(session)
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> AuthResult<Session> {
        self.set_session_calls.fetch_add(1, Ordering::SeqCst);
        let user = self
            .tokens
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or_else(|| AuthError::SessionEstablishFailed("invalid JWT".into()))?;
        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_in: None,
            user,
            provider_token: None,
            provider_refresh_token: None,
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
        self.cache.clear();
        Ok(())
    }
}
