use std::sync::Arc;

use crate::app::NexusApp;
use crate::auth::{
    AuthError, ExternalRedirect, OAuthRequest, RedirectParser, Session, SessionResolver,
};
use crate::integrations::error::{IntegrationError, IntegrationResult};
use crate::integrations::escalation::{EscalationOutcome, ScopeEscalationTrigger};
use crate::integrations::linker::{IntegrationLinker, PropertySelection};
use crate::integrations::model::{Integration, IntegrationProvider};
use crate::platform::{Navigator, OnceGate, TaskLiveness};

/// What the integrations page should show after the connect button is pressed.
#[derive(Clone, Debug)]
pub enum ToggleOutcome {
    Disconnected(Integration),
    /// The token works; let the user pick a property.
    Ready(PropertySelection),
    /// The user was sent to the provider for broader consent.
    Escalated(OAuthRequest),
}

/// Connect and disconnect flow of a project's integrations page.
///
/// One instance belongs to one page mount. It resumes at most one OAuth return,
/// and stops applying results once its [`TaskLiveness`] is abandoned.
pub struct ConnectFlow {
    app: NexusApp,
    linker: Arc<IntegrationLinker>,
    trigger: Arc<ScopeEscalationTrigger>,
    resolver: Arc<SessionResolver>,
    navigator: Arc<dyn Navigator>,
    parser: RedirectParser,
    gate: OnceGate,
    liveness: TaskLiveness,
}

impl ConnectFlow {
    pub fn new(
        app: NexusApp,
        linker: Arc<IntegrationLinker>,
        trigger: Arc<ScopeEscalationTrigger>,
        resolver: Arc<SessionResolver>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            app,
            linker,
            trigger,
            resolver,
            navigator,
            parser: RedirectParser::default(),
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

    /// Abandon this handle when the page goes away.
    pub fn liveness_handle(&self) -> TaskLiveness {
        self.liveness.clone()
    }

    pub fn linker(&self) -> &IntegrationLinker {
        &self.linker
    }

    /// Disconnects a connected provider, otherwise starts connecting it.
    pub async fn toggle(
        &self,
        project_id: &str,
        provider: IntegrationProvider,
    ) -> IntegrationResult<ToggleOutcome> {
        if project_id.is_empty() {
            return Err(IntegrationError::MissingProjectId);
        }

        if let Some(active) = self.linker.active_integration(project_id, provider).await? {
            let row = self.linker.disconnect(&active.id).await?;
            return Ok(ToggleOutcome::Disconnected(row));
        }

        if !provider.is_available() {
            return Err(IntegrationError::NotAvailable(provider));
        }

        let token = self.current_provider_token().await;
        match self
            .trigger
            .evaluate_or_escalate(project_id, token.as_deref())
            .await?
        {
            EscalationOutcome::Ready(properties) => {
                Ok(ToggleOutcome::Ready(PropertySelection::new(properties)))
            }
            EscalationOutcome::Redirected(request) => Ok(ToggleOutcome::Escalated(request)),
        }
    }

    /// Picks up where an escalation left off when the provider sends the user back.
    ///
    /// Returns `Ok(None)` when `href` is not an OAuth return, when a return was
    /// already handled by this flow, or once the page has been left.
    pub async fn resume_after_redirect(
        &self,
        project_id: &str,
        href: &str,
    ) -> IntegrationResult<Option<PropertySelection>> {
        let redirect = ExternalRedirect::parse(href);
        if !redirect.has_credential_indicators() {
            return Ok(None);
        }
        if project_id.is_empty() {
            return Err(IntegrationError::MissingProjectId);
        }
        if !self.gate.try_enter() {
            log::debug!("connect flow already resumed an OAuth return");
            return Ok(None);
        }

        let fields = self.parser.parse(&redirect);
        let resolved = self.resolver.resolve(&fields).await;
        if !self.liveness.is_live() {
            return Ok(None);
        }
        let session = match resolved {
            Ok(resolution) => Some(resolution.session),
            Err(err @ AuthError::ProviderDenied(_)) => return Err(err.into()),
            Err(err) => {
                log::debug!("redirect did not resolve a session ({err}); waiting for one");
                let settled = self
                    .resolver
                    .identity()
                    .wait_for_session(self.app.timings().session_settle_delay)
                    .await;
                if !self.liveness.is_live() {
                    return Ok(None);
                }
                settled?
            }
        };

        let token = provider_token(session.as_ref()).ok_or(IntegrationError::NoProviderToken)?;

        let route = self.app.routes().project_integrations(project_id);
        self.navigator.replace_url(&self.app.site_route(&route));

        let properties = self.linker.list_remote_properties(&token).await?;
        if !self.liveness.is_live() {
            return Ok(None);
        }
        Ok(Some(PropertySelection::new(properties)))
    }

    /// Links the selected property to the project.
    pub async fn confirm(
        &self,
        project_id: &str,
        selection: &PropertySelection,
    ) -> IntegrationResult<Integration> {
        let property = selection
            .selected()
            .ok_or(IntegrationError::NoPropertySelected)?;
        self.linker.confirm_link(project_id, property).await
    }

    async fn current_provider_token(&self) -> Option<String> {
        match self.resolver.identity().get_session().await {
            Ok(session) => provider_token(session.as_ref()),
            Err(err) => {
                log::warn!("could not read the current session: {err}");
                None
            }
        }
    }
}

fn provider_token(session: Option<&Session>) -> Option<String> {
    session
        .and_then(|session| session.provider_token.clone())
        .filter(|token| !token.is_empty())
}
