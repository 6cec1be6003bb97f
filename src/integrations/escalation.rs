use std::sync::Arc;

use crate::app::NexusApp;
use crate::auth::{
    GoogleAuthProvider, OAuthRedirectHandler, OAuthRequest, RedirectOperation,
    RedirectPersistence,
};
use crate::integrations::error::{IntegrationError, IntegrationResult};
use crate::integrations::inventory::AnalyticsAdminClient;
use crate::integrations::model::Ga4Property;

/// Why the current token cannot be used for the inventory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscalationReason {
    NoProviderToken,
    /// The inventory API answered with this status.
    Rejected(u16),
    Network(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Evaluation {
    /// The token works; these are the properties the pre-flight returned.
    Ready(Vec<Ga4Property>),
    Escalate(EscalationReason),
}

#[derive(Clone, Debug)]
pub enum EscalationOutcome {
    Ready(Vec<Ga4Property>),
    /// The browser was sent to the provider for broader consent.
    Redirected(OAuthRequest),
}

/// Decides whether a provider token can read analytics data and, if not,
/// starts a new authorization with the data scopes.
pub struct ScopeEscalationTrigger {
    app: NexusApp,
    inventory: AnalyticsAdminClient,
    handler: Arc<dyn OAuthRedirectHandler>,
    redirect_persistence: Arc<dyn RedirectPersistence>,
}

impl ScopeEscalationTrigger {
    /// `redirect_persistence` must be the one the identity provider reads PKCE verifiers from.
    pub fn new(
        app: NexusApp,
        handler: Arc<dyn OAuthRedirectHandler>,
        redirect_persistence: Arc<dyn RedirectPersistence>,
    ) -> Self {
        Self {
            inventory: AnalyticsAdminClient::new(&app),
            app,
            handler,
            redirect_persistence,
        }
    }

    pub fn with_inventory(mut self, inventory: AnalyticsAdminClient) -> Self {
        self.inventory = inventory;
        self
    }

    /// Pre-flights the inventory with `provider_token`. Never fails.
    pub async fn evaluate(&self, provider_token: Option<&str>) -> Evaluation {
        let Some(token) = provider_token.filter(|token| !token.is_empty()) else {
            return Evaluation::Escalate(EscalationReason::NoProviderToken);
        };

        match self.inventory.list_properties(token).await {
            Ok(properties) => Evaluation::Ready(properties),
            Err(IntegrationError::ProviderApi { status, .. }) => {
                log::info!("provider token rejected by inventory ({status}); escalating scopes");
                Evaluation::Escalate(EscalationReason::Rejected(status))
            }
            Err(err) => {
                log::warn!("inventory pre-flight failed: {err}");
                Evaluation::Escalate(EscalationReason::Network(err.to_string()))
            }
        }
    }

    /// Sends the user back to the provider asking for identity and data scopes.
    ///
    /// The provider returns to the project's integrations page.
    pub async fn escalate(&self, project_id: &str) -> IntegrationResult<OAuthRequest> {
        if project_id.is_empty() {
            return Err(IntegrationError::MissingProjectId);
        }
        let provider = GoogleAuthProvider::with_data_scopes(&self.app);
        let redirect_to = self
            .app
            .site_route(&self.app.routes().project_integrations(project_id));
        let request = provider.start_redirect(
            &redirect_to,
            RedirectOperation::LinkIntegration {
                project_id: project_id.to_string(),
            },
            self.handler.as_ref(),
            self.redirect_persistence.as_ref(),
        )?;
        log::info!("requested analytics consent for project {project_id}");
        Ok(request)
    }

    /// [`Self::evaluate`], escalating when the token is not good enough.
    pub async fn evaluate_or_escalate(
        &self,
        project_id: &str,
        provider_token: Option<&str>,
    ) -> IntegrationResult<EscalationOutcome> {
        match self.evaluate(provider_token).await {
            Evaluation::Ready(properties) => Ok(EscalationOutcome::Ready(properties)),
            Evaluation::Escalate(_) => self
                .escalate(project_id)
                .await
                .map(EscalationOutcome::Redirected),
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::auth::{
        InMemoryRedirectPersistence, RecordingRedirectHandler, ADWORDS_SCOPE,
        ANALYTICS_READONLY_SCOPE,
    };
    use crate::test_support::{start_mock_server, test_app};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use url::Url;

    struct Harness {
        handler: Arc<RecordingRedirectHandler>,
        persistence: Arc<InMemoryRedirectPersistence>,
        trigger: ScopeEscalationTrigger,
    }

    fn harness(base_url: &str) -> Harness {
        let handler = Arc::new(RecordingRedirectHandler::default());
        let persistence = InMemoryRedirectPersistence::shared();
        let trigger =
            ScopeEscalationTrigger::new(test_app(base_url), handler.clone(), persistence.clone());
        Harness {
            handler,
            persistence,
            trigger,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_token_escalates_without_network() {
        let h = harness("http://127.0.0.1:9");
        assert_eq!(
            h.trigger.evaluate(None).await,
            Evaluation::Escalate(EscalationReason::NoProviderToken)
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn working_token_returns_preflight_listing() {
        let server = start_mock_server().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1beta/accountSummaries");
                then.status(200).json_body(json!({
                    "accountSummaries": [{
                        "account": "accounts/1",
                        "displayName": "Acme",
                        "propertySummaries": [{"property": "properties/10", "displayName": "Site"}]
                    }]
                }));
            })
            .await;
        let h = harness(&server.base_url());

        match h.trigger.evaluate_or_escalate("pj-1", Some("ya29")).await.unwrap() {
            EscalationOutcome::Ready(properties) => assert_eq!(properties.len(), 1),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(mock.hits_async().await, 1);
        assert!(h.handler.requests().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn forbidden_preflight_redirects_with_data_scopes() {
        let server = start_mock_server().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1beta/accountSummaries");
                then.status(403).body("insufficient scopes");
            })
            .await;
        let h = harness(&server.base_url());

        let outcome = h
            .trigger
            .evaluate_or_escalate("pj-1", Some("ya29"))
            .await
            .unwrap();
        let EscalationOutcome::Redirected(request) = outcome else {
            panic!("expected a redirect");
        };

        let url = Url::parse(&request.auth_url).unwrap();
        let pairs: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        assert!(pairs["scopes"].contains(ANALYTICS_READONLY_SCOPE));
        assert!(pairs["scopes"].contains(ADWORDS_SCOPE));
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["prompt"], "consent");
        assert_eq!(
            pairs["redirect_to"],
            "https://app.example.com/#/projects/pj-1/integrations"
        );
        assert_eq!(h.handler.requests().len(), 1);
        assert_eq!(
            h.persistence.get().unwrap().map(|pending| pending.operation),
            Some(RedirectOperation::LinkIntegration {
                project_id: "pj-1".into()
            })
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unreachable_inventory_escalates() {
        let h = harness("http://127.0.0.1:9");
        assert!(matches!(
            h.trigger.evaluate(Some("ya29")).await,
            Evaluation::Escalate(EscalationReason::Network(_))
        ));
    }
}
