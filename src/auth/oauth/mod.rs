mod pkce;
mod provider;
mod providers;
mod redirect;

pub use pkce::PkcePair;
pub use provider::OAuthProvider;
pub use providers::{
    GoogleAuthProvider, ADWORDS_SCOPE, ANALYTICS_READONLY_SCOPE, GOOGLE_PROVIDER_ID,
    IDENTITY_SCOPES,
};
pub use redirect::{
    InMemoryRedirectPersistence, PendingRedirect, RedirectOperation, RedirectPersistence,
};

use std::sync::Mutex;

use crate::auth::error::{AuthError, AuthResult};

/// Parameters needed to leave the page for an OAuth provider.
///
/// The authorization URL is fully built; handlers only have to open it.
#[derive(Debug, Clone)]
pub struct OAuthRequest {
    /// Provider identifier (e.g. `google`).
    pub provider_id: String,
    /// Fully qualified authorization URL.
    pub auth_url: String,
    /// Where the provider sends the browser back to.
    pub redirect_to: String,
    pub scopes: Vec<String>,
    /// Optional PKCE verifier/challenge pair for this request.
    pub pkce: Option<PkcePair>,
}

impl OAuthRequest {
    pub fn pkce(&self) -> Option<&PkcePair> {
        self.pkce.as_ref()
    }
}

/// Handles the outbound half of a redirect flow.
///
/// Implementations leave the current page for `request.auth_url`. The inbound
/// half is handled by the callback resolvers once the browser comes back.
pub trait OAuthRedirectHandler: Send + Sync {
    fn initiate_redirect(&self, request: OAuthRequest) -> AuthResult<()>;
}

/// Redirect handler that records requests instead of navigating.
///
/// Useful for native hosts that open the URL themselves, and for tests.
#[derive(Debug, Default)]
pub struct RecordingRedirectHandler {
    requests: Mutex<Vec<OAuthRequest>>,
    fail: bool,
}

impl RecordingRedirectHandler {
    /// A handler whose every redirect attempt fails.
    pub fn failing() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn requests(&self) -> Vec<OAuthRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<OAuthRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl OAuthRedirectHandler for RecordingRedirectHandler {
    fn initiate_redirect(&self, request: OAuthRequest) -> AuthResult<()> {
        if self.fail {
            return Err(AuthError::Network(format!(
                "Unable to open {} authorization page",
                request.provider_id
            )));
        }
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

/// Sends the browser to the provider by assigning `window.location`.
#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserRedirectHandler;

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
impl OAuthRedirectHandler for BrowserRedirectHandler {
    fn initiate_redirect(&self, request: OAuthRequest) -> AuthResult<()> {
        let window = web_sys::window()
            .ok_or_else(|| AuthError::Network("Browser window is unavailable".into()))?;
        window
            .location()
            .set_href(&request.auth_url)
            .map_err(|err| AuthError::Network(format!("Failed to start redirect: {err:?}")))
    }
}
