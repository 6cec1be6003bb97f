use std::sync::Arc;

use crate::app::{CallbackTimings, NexusApp, Routes};
use crate::auth::{AuthError, ExternalRedirect, IdentityProvider, RedirectParser};
use crate::integrations::error::{IntegrationError, IntegrationResult};
use crate::integrations::linker::IntegrationLinker;
use crate::integrations::model::Integration;
use crate::platform::{DeferredNavigation, Navigator, OnceGate, TaskLiveness};

/// Query parameter naming the project a token-capture redirect belongs to.
pub const PROJECT_QUERY_PARAM: &str = "project";

/// Result of handling one token-capture redirect.
#[derive(Clone, Debug, PartialEq)]
pub enum IntegrationOutcome {
    Linked {
        integration: Integration,
        next: DeferredNavigation,
    },
    Failed {
        error: IntegrationError,
        message: String,
        next: DeferredNavigation,
    },
    AlreadyHandled,
    Abandoned,
}

impl IntegrationOutcome {
    pub fn next(&self) -> Option<&DeferredNavigation> {
        match self {
            IntegrationOutcome::Linked { next, .. } | IntegrationOutcome::Failed { next, .. } => {
                Some(next)
            }
            IntegrationOutcome::AlreadyHandled | IntegrationOutcome::Abandoned => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, IntegrationOutcome::Linked { .. })
    }

    pub async fn complete(&self, navigator: &dyn Navigator) {
        if let Some(next) = self.next() {
            next.perform(navigator).await;
        }
    }
}

/// Redirect target for provider token capture (`/integrations/callback?project=…`).
pub struct IntegrationCallback {
    linker: Arc<IntegrationLinker>,
    identity: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    parser: RedirectParser,
    routes: Routes,
    timings: CallbackTimings,
    gate: OnceGate,
    liveness: TaskLiveness,
}

impl IntegrationCallback {
    pub fn new(
        app: &NexusApp,
        linker: Arc<IntegrationLinker>,
        identity: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            linker,
            identity,
            navigator,
            parser: RedirectParser::default(),
            routes: app.routes().clone(),
            timings: app.timings(),
            gate: OnceGate::new(),
            liveness: TaskLiveness::new(),
        }
    }

    pub fn parser(mut self, parser: RedirectParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn liveness(mut self, liveness: TaskLiveness) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn liveness_handle(&self) -> TaskLiveness {
        self.liveness.clone()
    }

    /// Captures the provider tokens carried by `href` without navigating.
    pub async fn handle(&self, href: &str) -> IntegrationOutcome {
        if !self.gate.try_enter() {
            log::debug!("integration callback already handled a redirect");
            return IntegrationOutcome::AlreadyHandled;
        }

        let redirect = ExternalRedirect::parse(href);
        let project_id = redirect
            .query_param(PROJECT_QUERY_PARAM)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let tokens = match project_id.as_deref() {
            Some(_) => self.provider_tokens(&redirect).await,
            None => Err(IntegrationError::MissingProjectId),
        };
        if !self.liveness.is_live() {
            return IntegrationOutcome::Abandoned;
        }
        self.navigator.replace_url(&redirect.sanitized_href());

        let result = match (project_id.as_deref(), tokens) {
            (Some(project_id), Ok((access, refresh))) => {
                self.linker
                    .capture_tokens(project_id, &access, refresh.as_deref())
                    .await
            }
            (None, _) => Err(IntegrationError::MissingProjectId),
            (_, Err(err)) => Err(err),
        };

        let route = project_id
            .map(|id| self.routes.project_integrations(&id))
            .unwrap_or_else(|| self.routes.squads.clone());
        match result {
            Ok(integration) => IntegrationOutcome::Linked {
                integration,
                next: DeferredNavigation::new(route, self.timings.success_redirect_delay),
            },
            Err(error) => {
                log::warn!("integration callback failed: {error}");
                IntegrationOutcome::Failed {
                    message: error.user_message(),
                    error,
                    next: DeferredNavigation::new(route, self.timings.failure_redirect_delay),
                }
            }
        }
    }

    /// Handles the navigator's current address and performs the resulting navigation.
    pub async fn run(&self) -> IntegrationOutcome {
        let href = self.navigator.current_href().unwrap_or_default();
        let outcome = self.handle(&href).await;
        if let Some(next) = outcome.next() {
            next.perform_if_live(self.navigator.as_ref(), &self.liveness)
                .await;
        }
        outcome
    }

    /// Tokens from the redirect, else from the settled identity session.
    async fn provider_tokens(
        &self,
        redirect: &ExternalRedirect,
    ) -> IntegrationResult<(String, Option<String>)> {
        let fields = self.parser.parse(redirect);
        if fields.has_error() {
            let message = fields
                .error_description
                .or(fields.error_code)
                .unwrap_or_default();
            return Err(AuthError::ProviderDenied(message).into());
        }

        let access = non_empty(fields.provider_token).or_else(|| non_empty(fields.access_token));
        let refresh = non_empty(fields.provider_refresh_token)
            .or_else(|| non_empty(fields.refresh_token));
        if let Some(access) = access {
            return Ok((access, refresh));
        }

        log::debug!("redirect carried no provider token; waiting for the session");
        let session = self
            .identity
            .wait_for_session(self.timings.session_settle_delay)
            .await?;
        let session = session.ok_or(IntegrationError::NoProviderToken)?;
        let access = non_empty(session.provider_token).ok_or(IntegrationError::NoProviderToken)?;
        Ok((access, non_empty(session.provider_refresh_token)))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::auth::{InMemoryIdentityProvider, Session, SessionUser};
    use crate::integrations::model::IntegrationStatus;
    use crate::integrations::store::InMemoryIntegrationStore;
    use crate::platform::{NavigationEvent, RecordingNavigator};
    use crate::test_support::test_app;
    use std::time::Duration;

    struct Harness {
        identity: Arc<InMemoryIdentityProvider>,
        store: Arc<InMemoryIntegrationStore>,
        navigator: Arc<RecordingNavigator>,
        callback: IntegrationCallback,
    }

    fn harness(href: &str) -> Harness {
        let app = test_app("http://127.0.0.1:9");
        let identity = Arc::new(InMemoryIdentityProvider::new());
        let store = Arc::new(InMemoryIntegrationStore::new());
        let navigator = Arc::new(RecordingNavigator::with_href(href));
        let linker = Arc::new(IntegrationLinker::new(&app, store.clone()));
        let callback =
            IntegrationCallback::new(&app, linker, identity.clone(), navigator.clone());
        Harness {
            identity,
            store,
            navigator,
            callback,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn captures_tokens_from_fragment() {
        let href = "https://app.example.com/#/integrations/callback?project=pj-1#provider_token=ya29&refresh_token=1//rt";
        let h = harness(href);

        let outcome = h.callback.run().await;
        let IntegrationOutcome::Linked { integration, next } = outcome else {
            panic!("expected tokens to be captured");
        };
        let tokens = integration.metadata.tokens().expect("token metadata");
        assert_eq!(tokens.access_token, "ya29");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//rt"));
        assert_eq!(integration.status, IntegrationStatus::Active);
        assert_eq!(next.route, "/projects/pj-1/integrations");
        assert_eq!(
            h.navigator.events(),
            vec![
                NavigationEvent::Replaced(
                    "https://app.example.com/#/integrations/callback?project=pj-1".into()
                ),
                NavigationEvent::Navigated("/projects/pj-1/integrations".into()),
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn falls_back_to_session_provider_token() {
        let h = harness("");
        h.identity.publish_session(Session {
            access_token: "jwt".into(),
            refresh_token: "rt".into(),
            expires_in: None,
            user: SessionUser::default(),
            provider_token: Some("ya29-session".into()),
            provider_refresh_token: None,
        });

        let outcome = h
            .callback
            .handle("https://app.example.com/?project=pj-2#/integrations/callback")
            .await;
        assert!(outcome.is_linked());
        assert_eq!(
            h.store.rows()[0].metadata.tokens().map(|t| t.access_token.as_str()),
            Some("ya29-session")
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_project_returns_to_squads() {
        let h = harness("");
        let outcome = h
            .callback
            .handle("https://app.example.com/#/integrations/callback#provider_token=ya29")
            .await;

        match outcome {
            IntegrationOutcome::Failed {
                error,
                message,
                next,
            } => {
                assert_eq!(error, IntegrationError::MissingProjectId);
                assert_eq!(message, "Project ID not found");
                assert_eq!(next.route, "/squads");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(h.store.rows().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn no_token_anywhere_fails_on_project_route() {
        let h = harness("");
        let outcome = h
            .callback
            .handle("https://app.example.com/#/integrations/callback?project=pj-1")
            .await;

        let IntegrationOutcome::Failed { error, next, .. } = outcome else {
            panic!("expected a failure");
        };
        assert_eq!(error, IntegrationError::NoProviderToken);
        assert_eq!(next.route, "/projects/pj-1/integrations");
        assert_eq!(next.after, Duration::ZERO);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn handles_only_once_and_respects_abandon() {
        let href = "https://app.example.com/#/integrations/callback?project=pj-1#provider_token=ya29";
        let h = harness(href);
        assert!(h.callback.handle(href).await.is_linked());
        assert_eq!(
            h.callback.handle(href).await,
            IntegrationOutcome::AlreadyHandled
        );

        let h = harness(href);
        h.callback.liveness_handle().abandon();
        assert_eq!(h.callback.handle(href).await, IntegrationOutcome::Abandoned);
        assert!(h.store.rows().is_empty());
    }
}
