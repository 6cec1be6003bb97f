//! Client SDK for the Nexus squads dashboard.
//!
//! The crate turns OAuth redirects into local sessions and project-scoped
//! marketing integrations:
//!
//! - [`auth`] parses provider redirects, resolves identity sessions and keeps the
//!   signed-in [`auth::LocalUser`].
//! - [`integrations`] lists Google Analytics 4 properties, escalates OAuth scopes
//!   when a token cannot read them, and persists the chosen property.
//! - [`dispatch`] routes a callback URL to the right flow.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nexus_rs_sdk::app::{initialize_app, NexusOptions};
//! use nexus_rs_sdk::auth::{AuthCallback, AuthContext, InMemoryPersistence, RestIdentityProvider};
//! use nexus_rs_sdk::platform::RecordingNavigator;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let app = initialize_app(NexusOptions {
//!     project_url: "https://demo.supabase.co".into(),
//!     anon_key: "anon-key".into(),
//!     site_url: "https://dashboard.example.com".into(),
//!     ..Default::default()
//! })?;
//!
//! let identity = Arc::new(RestIdentityProvider::new(app.clone()));
//! let context = AuthContext::new(Arc::new(InMemoryPersistence::default()));
//! context.initialize()?;
//!
//! let navigator = Arc::new(RecordingNavigator::default());
//! let callback = AuthCallback::new(identity, context.clone(), navigator.clone());
//! let outcome = callback
//!     .handle("https://dashboard.example.com/#/auth/callback#access_token=AT1&refresh_token=RT1")
//!     .await;
//! outcome.complete(navigator.as_ref()).await;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod auth;
pub mod dispatch;
pub mod integrations;
pub mod platform;
pub mod util;

#[cfg(all(test, not(target_arch = "wasm32")))]
pub(crate) mod test_support;
