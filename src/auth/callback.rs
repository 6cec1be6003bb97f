use std::sync::Arc;

use crate::app::{CallbackTimings, Routes};
use crate::auth::api::IdentityProvider;
use crate::auth::context::AuthContext;
use crate::auth::error::AuthError;
use crate::auth::model::LocalUser;
use crate::auth::redirect::{ExternalRedirect, RedirectParser};
use crate::auth::resolver::{ResolutionPath, SessionResolver};
use crate::platform::{DeferredNavigation, Navigator, OnceGate, TaskLiveness};

/// Result of handling one identity-login redirect.
#[derive(Clone, Debug, PartialEq)]
pub enum CallbackOutcome {
    Authenticated {
        user: LocalUser,
        path: ResolutionPath,
        next: DeferredNavigation,
    },
    Failed {
        error: AuthError,
        /// Text to show while waiting for `next`.
        message: String,
        next: DeferredNavigation,
    },
    /// This callback already processed a redirect.
    AlreadyHandled,
    /// The owner went away before the flow finished; nothing was written.
    Abandoned,
}

impl CallbackOutcome {
    pub fn next(&self) -> Option<&DeferredNavigation> {
        match self {
            CallbackOutcome::Authenticated { next, .. } | CallbackOutcome::Failed { next, .. } => {
                Some(next)
            }
            CallbackOutcome::AlreadyHandled | CallbackOutcome::Abandoned => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, CallbackOutcome::Authenticated { .. })
    }

    /// Performs the pending navigation, if any.
    pub async fn complete(&self, navigator: &dyn Navigator) {
        if let Some(next) = self.next() {
            next.perform(navigator).await;
        }
    }
}

/// Redirect target for identity sign-in (`/auth/callback`).
///
/// Parses the redirect, resolves a session, records the local user and strips
/// credentials from the visible address. Each instance handles one redirect.
///
/// [`AuthCallback::new`] gives the instance a private [`SessionResolver`]. A
/// host that may mount the route again for the same navigation should build
/// every instance with [`AuthCallback::with_resolver`] and one shared resolver,
/// so an authorization code is never exchanged twice.
pub struct AuthCallback {
    resolver: Arc<SessionResolver>,
    context: Arc<AuthContext>,
    navigator: Arc<dyn Navigator>,
    parser: RedirectParser,
    routes: Routes,
    timings: CallbackTimings,
    gate: OnceGate,
    liveness: TaskLiveness,
}

impl AuthCallback {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        context: Arc<AuthContext>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::with_resolver(Arc::new(SessionResolver::new(identity)), context, navigator)
    }

    /// Shares `resolver`, so codes exchanged elsewhere are not exchanged again.
    pub fn with_resolver(
        resolver: Arc<SessionResolver>,
        context: Arc<AuthContext>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            resolver,
            context,
            navigator,
            parser: RedirectParser::default(),
            routes: Routes::default(),
            timings: CallbackTimings::default(),
            gate: OnceGate::new(),
            liveness: TaskLiveness::new(),
        }
    }

    pub fn routes(mut self, routes: Routes) -> Self {
        self.routes = routes;
        self
    }

    pub fn timings(mut self, timings: CallbackTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn parser(mut self, parser: RedirectParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn liveness(mut self, liveness: TaskLiveness) -> Self {
        self.liveness = liveness;
        self
    }

    /// Handle that abandons this callback's in-flight work.
    pub fn liveness_handle(&self) -> TaskLiveness {
        self.liveness.clone()
    }

    /// Resolves the redirect at `href` without navigating.
    pub async fn handle(&self, href: &str) -> CallbackOutcome {
        if !self.gate.try_enter() {
            log::debug!("auth callback already handled a redirect");
            return CallbackOutcome::AlreadyHandled;
        }

        let redirect = ExternalRedirect::parse(href);
        let fields = self.parser.parse(&redirect);
        log::debug!("auth callback strategies: {:?}", fields.strategies);

        let result = self.resolver.resolve(&fields).await;
        if !self.liveness.is_live() {
            return CallbackOutcome::Abandoned;
        }
        self.navigator.replace_url(&redirect.sanitized_href());

        let failure = match result {
            Ok(resolution) => {
                let user = LocalUser::from(&resolution.session);
                match self.context.sign_in(user.clone()) {
                    Ok(()) => {
                        log::info!("signed in user {} via {:?}", user.id, resolution.path);
                        return CallbackOutcome::Authenticated {
                            user,
                            path: resolution.path,
                            next: DeferredNavigation::immediate(self.routes.squads.clone()),
                        };
                    }
                    Err(err) => err,
                }
            }
            Err(err) => err,
        };

        log::warn!("auth callback failed: {failure}");
        CallbackOutcome::Failed {
            message: failure.user_message(),
            error: failure,
            next: DeferredNavigation::new(
                self.routes.login.clone(),
                self.timings.failure_redirect_delay,
            ),
        }
    }

    /// Handles the navigator's current address and performs the resulting navigation.
    pub async fn run(&self) -> CallbackOutcome {
        let href = self.navigator.current_href().unwrap_or_default();
        let outcome = self.handle(&href).await;
        if let Some(next) = outcome.next() {
            next.perform_if_live(self.navigator.as_ref(), &self.liveness)
                .await;
        }
        outcome
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::auth::api::InMemoryIdentityProvider;
    use crate::auth::model::{Session, SessionUser};
    use crate::auth::persistence::{IdentityPersistence, InMemoryPersistence};
    use crate::platform::RecordingNavigator;
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        identity: Arc<InMemoryIdentityProvider>,
        persistence: Arc<InMemoryPersistence>,
        navigator: Arc<RecordingNavigator>,
        callback: AuthCallback,
    }

    fn harness(href: &str) -> Harness {
        let identity = Arc::new(InMemoryIdentityProvider::new());
        let persistence = Arc::new(InMemoryPersistence::default());
        let context = AuthContext::new(persistence.clone());
        context.initialize().unwrap();
        let navigator = Arc::new(RecordingNavigator::with_href(href));
        let callback = AuthCallback::new(identity.clone(), context, navigator.clone())
            .timings(CallbackTimings::immediate());
        Harness {
            identity,
            persistence,
            navigator,
            callback,
        }
    }

    fn session_user(metadata: serde_json::Value) -> SessionUser {
        SessionUser {
            id: "usr-1".into(),
            email: Some("demo@nexus.com".into()),
            user_metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn token_pair_signs_in_and_goes_to_squads() {
        let href = "https://app.example.com/#/auth/callback#access_token=AT1&refresh_token=RT1";
        let h = harness(href);
        h.identity
            .register_access_token("AT1", session_user(json!({"name": "demo"})));

        let outcome = h.callback.run().await;

        assert!(outcome.is_authenticated());
        assert_eq!(
            h.persistence.get().unwrap().map(|user| user.name),
            Some("demo".to_string())
        );
        assert_eq!(
            h.navigator.current_href().as_deref(),
            Some("https://app.example.com/#/auth/callback")
        );
        assert_eq!(h.navigator.last_route().as_deref(), Some("/squads"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn provider_error_shows_description_then_login() {
        let href = "https://app.example.com/?error=access_denied&error_description=User%20cancelled#/auth/callback";
        let h = harness(href);

        let outcome = h.callback.handle(href).await;
        match &outcome {
            CallbackOutcome::Failed { message, next, .. } => {
                assert_eq!(message, "User cancelled");
                assert_eq!(next.route, "/login");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(h.persistence.get().unwrap().is_none());

        outcome.complete(h.navigator.as_ref()).await;
        assert_eq!(h.navigator.last_route().as_deref(), Some("/login"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failure_waits_the_configured_delay() {
        let href = "https://app.example.com/#/auth/callback";
        let identity = Arc::new(InMemoryIdentityProvider::new());
        let context = AuthContext::new(Arc::new(InMemoryPersistence::default()));
        let navigator = Arc::new(RecordingNavigator::with_href(href));
        let callback = AuthCallback::new(identity, context, navigator.clone());

        match callback.handle(href).await {
            CallbackOutcome::Failed { message, next, .. } => {
                assert_eq!(message, "No authentication code received");
                assert_eq!(next.after, Duration::from_secs(3));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn second_invocation_is_ignored() {
        let href = "https://app.example.com/?code=C1#/auth/callback";
        let h = harness(href);
        h.identity.register_code(
            "C1",
            Session {
                access_token: "AT".into(),
                refresh_token: "RT".into(),
                expires_in: None,
                user: session_user(json!({})),
                provider_token: None,
                provider_refresh_token: None,
            },
        );

        assert!(h.callback.handle(href).await.is_authenticated());
        assert_eq!(h.callback.handle(href).await, CallbackOutcome::AlreadyHandled);
        assert_eq!(h.identity.exchange_calls(), 1);
        assert_eq!(
            h.persistence.get().unwrap().map(|user| user.name),
            Some("demo@nexus.com".to_string())
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn remounted_callback_with_shared_resolver_does_not_reuse_code() {
        let href = "https://app.example.com/?code=C1#/auth/callback";
        let identity = Arc::new(InMemoryIdentityProvider::new());
        identity.register_code(
            "C1",
            Session {
                access_token: "AT".into(),
                refresh_token: "RT".into(),
                expires_in: None,
                user: session_user(json!({})),
                provider_token: None,
                provider_refresh_token: None,
            },
        );
        let resolver = Arc::new(SessionResolver::new(identity.clone()));
        let mount = || {
            let context = AuthContext::new(Arc::new(InMemoryPersistence::default()));
            AuthCallback::with_resolver(
                resolver.clone(),
                context,
                Arc::new(RecordingNavigator::with_href(href)),
            )
            .timings(CallbackTimings::immediate())
        };

        assert!(mount().handle(href).await.is_authenticated());
        match mount().handle(href).await {
            CallbackOutcome::Failed { error, .. } => {
                assert!(matches!(error, AuthError::CodeExchangeFailed(_)));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(identity.exchange_calls(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn abandoned_callback_writes_nothing() {
        let href = "https://app.example.com/#access_token=AT1&refresh_token=RT1";
        let h = harness(href);
        h.identity
            .register_access_token("AT1", session_user(json!({})));
        h.callback.liveness_handle().abandon();

        let outcome = h.callback.run().await;

        assert_eq!(outcome, CallbackOutcome::Abandoned);
        assert!(h.persistence.get().unwrap().is_none());
        assert!(h.navigator.events().is_empty());
    }
}
