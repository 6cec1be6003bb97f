//! Routing of callback URLs to the identity or the integration flow.

use crate::auth::{AuthCallback, CallbackOutcome, ExternalRedirect};
use crate::integrations::{IntegrationCallback, IntegrationOutcome, PROJECT_QUERY_PARAM};
use crate::platform::Navigator;

#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    Auth(CallbackOutcome),
    Integration(IntegrationOutcome),
}

impl DispatchOutcome {
    pub async fn complete(&self, navigator: &dyn Navigator) {
        match self {
            DispatchOutcome::Auth(outcome) => outcome.complete(navigator).await,
            DispatchOutcome::Integration(outcome) => outcome.complete(navigator).await,
        }
    }
}

/// Sends a redirect carrying a `project` query parameter to the integration
/// callback and everything else to the identity callback.
pub struct RedirectDispatcher {
    auth: AuthCallback,
    integration: IntegrationCallback,
}

impl RedirectDispatcher {
    pub fn new(auth: AuthCallback, integration: IntegrationCallback) -> Self {
        Self { auth, integration }
    }

    pub fn is_integration_redirect(href: &str) -> bool {
        ExternalRedirect::parse(href)
            .query_param(PROJECT_QUERY_PARAM)
            .is_some()
    }

    pub async fn dispatch(&self, href: &str) -> DispatchOutcome {
        if Self::is_integration_redirect(href) {
            log::debug!("dispatching redirect to the integration callback");
            DispatchOutcome::Integration(self.integration.handle(href).await)
        } else {
            log::debug!("dispatching redirect to the auth callback");
            DispatchOutcome::Auth(self.auth.handle(href).await)
        }
    }
}
