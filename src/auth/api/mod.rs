//! Identity service collaborator.
//!
//! [`IdentityProvider`] is the seam between the callback flows and the hosted
//! identity service. [`RestIdentityProvider`] talks to a GoTrue-compatible
//! `/auth/v1` API; [`InMemoryIdentityProvider`] keeps everything in process.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::oneshot;

use crate::auth::error::AuthResult;
use crate::auth::model::Session;
use crate::platform::runtime::{sleep, with_timeout};

mod memory;
mod rest;
mod token;

pub use memory::InMemoryIdentityProvider;
pub use rest::RestIdentityProvider;

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait IdentityProvider: Send + Sync {
    /// Trades a single-use authorization code for a session.
    async fn exchange_code_for_session(&self, code: &str) -> AuthResult<Session>;

    /// Establishes a session from tokens delivered in a redirect fragment.
    ///
    /// `refresh_token` may be empty when the provider only issued an access token.
    async fn set_session(&self, access_token: &str, refresh_token: &str) -> AuthResult<Session>;

    /// The session currently held by the provider, if any.
    async fn get_session(&self) -> AuthResult<Option<Session>>;

    /// Resolves once a session is available or `settle` has elapsed.
    ///
    /// The default is a bounded delay followed by a single retry.
    async fn wait_for_session(&self, settle: Duration) -> AuthResult<Option<Session>> {
        if let Some(session) = self.get_session().await? {
            return Ok(Some(session));
        }
        sleep(settle).await;
        self.get_session().await
    }

    /// Records provider tokens from a redirect on the held session.
    ///
    /// Later reads of the session see them. Values that are `None` leave the
    /// stored ones alone. Returns the updated session, or `None` if none is held.
    async fn attach_provider_tokens(
        &self,
        provider_token: Option<&str>,
        provider_refresh_token: Option<&str>,
    ) -> AuthResult<Option<Session>>;

    async fn sign_out(&self) -> AuthResult<()>;
}

#[derive(Default)]
struct SessionCacheState {
    session: Option<Session>,
    waiters: Vec<oneshot::Sender<Session>>,
}

/// Session slot with a ready notification for [`IdentityProvider::wait_for_session`].
#[derive(Default)]
pub(crate) struct SessionCache {
    state: Mutex<SessionCacheState>,
}

impl SessionCache {
    pub(crate) fn current(&self) -> Option<Session> {
        self.state.lock().unwrap().session.clone()
    }

    /// Stores `session` and wakes everyone waiting for one.
    pub(crate) fn store(&self, session: Session) {
        let waiters = {
            let mut state = self.state.lock().unwrap();
            state.session = Some(session.clone());
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(session.clone());
        }
    }

    pub(crate) fn attach_provider_tokens(
        &self,
        provider_token: Option<&str>,
        provider_refresh_token: Option<&str>,
    ) -> Option<Session> {
        let mut state = self.state.lock().unwrap();
        let session = state.session.as_mut()?;
        if let Some(token) = provider_token {
            session.provider_token = Some(token.to_string());
        }
        if let Some(token) = provider_refresh_token {
            session.provider_refresh_token = Some(token.to_string());
        }
        Some(session.clone())
    }

    pub(crate) fn clear(&self) {
        self.state.lock().unwrap().session = None;
    }

    pub(crate) async fn wait(&self, timeout: Duration) -> Option<Session> {
        let receiver = {
            let mut state = self.state.lock().unwrap();
            if let Some(session) = state.session.clone() {
                return Some(session);
            }
            let (sender, receiver) = oneshot::channel();
            state.waiters.push(sender);
            receiver
        };

        match with_timeout(timeout, receiver).await {
            Some(Ok(session)) => Some(session),
            _ => self.current(),
        }
    }
}
