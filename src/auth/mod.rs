//! Identity sign-in: redirect parsing, session resolution and the local identity store.
//!
//! An OAuth provider sends the browser back to the dashboard with its result
//! somewhere in the URL. [`parse_redirect`] pulls the credential fields out,
//! [`SessionResolver`] turns them into a [`Session`] through an
//! [`IdentityProvider`], and [`AuthCallback`] records the resulting
//! [`LocalUser`] in an [`AuthContext`].

mod api;
mod callback;
mod context;
mod error;
mod model;
mod oauth;
mod persistence;
mod redirect;
mod resolver;

#[doc(inline)]
pub use api::{IdentityProvider, InMemoryIdentityProvider, RestIdentityProvider};

#[doc(inline)]
pub use callback::{AuthCallback, CallbackOutcome};

#[doc(inline)]
pub use context::{AuthContext, RouteDecision};

#[doc(inline)]
pub use error::{AuthError, AuthResult};

#[doc(inline)]
pub use model::{LocalUser, Session, SessionUser};

#[doc(inline)]
pub use oauth::{
    GoogleAuthProvider, InMemoryRedirectPersistence, OAuthProvider, OAuthRedirectHandler,
    OAuthRequest, PendingRedirect, PkcePair, RecordingRedirectHandler, RedirectOperation,
    RedirectPersistence, ADWORDS_SCOPE, ANALYTICS_READONLY_SCOPE, GOOGLE_PROVIDER_ID,
    IDENTITY_SCOPES,
};

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
#[doc(inline)]
pub use oauth::BrowserRedirectHandler;

#[doc(inline)]
pub use persistence::{
    ClosurePersistence, IdentityPersistence, InMemoryPersistence, PersistenceListener,
    PersistenceSubscription, LOCAL_USER_KEY,
};

#[cfg(not(all(feature = "wasm-web", target_arch = "wasm32")))]
#[doc(inline)]
pub use persistence::FilePersistence;

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
#[doc(inline)]
pub use persistence::{
    WebStorageDriver, WebStoragePersistence, WebStorageRedirectPersistence, PENDING_REDIRECT_KEY,
};

#[doc(inline)]
pub use redirect::{
    parse_redirect, ExternalRedirect, ExtractionStrategy, ParsedCredentialFields, RedirectParser,
    DEFAULT_STRATEGIES,
};

#[doc(inline)]
pub use resolver::{Resolution, ResolutionPath, SessionResolver};
