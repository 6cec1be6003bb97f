use std::collections::BTreeMap;

use url::Url;

use super::pkce::PkcePair;
use super::redirect::{PendingRedirect, RedirectOperation, RedirectPersistence};
use super::{OAuthRedirectHandler, OAuthRequest};
use crate::auth::error::{AuthError, AuthResult};

/// Builder-like description of an OAuth authorization endpoint.
///
/// The provider keeps scopes and extra query parameters and turns them into an
/// [`OAuthRequest`] that a redirect handler opens.
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    provider_id: String,
    authorization_endpoint: String,
    scope_parameter: String,
    scopes: Vec<String>,
    custom_parameters: BTreeMap<String, String>,
    pkce_enabled: bool,
}

impl OAuthProvider {
    pub fn new(provider_id: impl Into<String>, authorization_endpoint: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            authorization_endpoint: authorization_endpoint.into(),
            scope_parameter: "scope".to_string(),
            scopes: Vec::new(),
            custom_parameters: BTreeMap::new(),
            pkce_enabled: false,
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn authorization_endpoint(&self) -> &str {
        &self.authorization_endpoint
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn custom_parameters(&self) -> &BTreeMap<String, String> {
        &self.custom_parameters
    }

    /// Name of the query parameter carrying the space-separated scopes.
    pub fn set_scope_parameter(&mut self, name: impl Into<String>) -> &mut Self {
        self.scope_parameter = name.into();
        self
    }

    /// Adds a scope if it has not been added yet. Order of first insertion is kept.
    pub fn add_scope(&mut self, scope: impl Into<String>) -> &mut Self {
        let value = scope.into();
        if !self.scopes.contains(&value) {
            self.scopes.push(value);
        }
        self
    }

    pub fn add_scopes<I, S>(&mut self, scopes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for scope in scopes {
            self.add_scope(scope);
        }
        self
    }

    pub fn set_custom_parameter(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.custom_parameters.insert(key.into(), value.into());
        self
    }

    pub fn enable_pkce(&mut self) -> &mut Self {
        self.pkce_enabled = true;
        self
    }

    pub fn pkce_enabled(&self) -> bool {
        self.pkce_enabled
    }

    /// Builds the authorization request that returns to `redirect_to`.
    pub fn build_request(&self, redirect_to: &str) -> AuthResult<OAuthRequest> {
        let mut url = Url::parse(&self.authorization_endpoint).map_err(|err| {
            AuthError::InvalidCredential(format!(
                "Invalid authorization endpoint for provider {}: {err}",
                self.provider_id
            ))
        })?;

        let pkce = self.pkce_enabled.then(PkcePair::generate);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("redirect_to", redirect_to);
            if !self.scopes.is_empty() {
                pairs.append_pair(&self.scope_parameter, &self.scopes.join(" "));
            }
            for (key, value) in &self.custom_parameters {
                pairs.append_pair(key, value);
            }
            if let Some(pair) = &pkce {
                pairs.append_pair("code_challenge", pair.code_challenge());
                pairs.append_pair("code_challenge_method", pair.method());
            }
        }

        Ok(OAuthRequest {
            provider_id: self.provider_id.clone(),
            auth_url: url.into(),
            redirect_to: redirect_to.to_string(),
            scopes: self.scopes.clone(),
            pkce,
        })
    }

    /// Records the pending redirect and hands the request to `handler`.
    ///
    /// The pending state is cleared again if the handler cannot leave the page.
    pub fn start_redirect(
        &self,
        redirect_to: &str,
        operation: RedirectOperation,
        handler: &dyn OAuthRedirectHandler,
        persistence: &dyn RedirectPersistence,
    ) -> AuthResult<OAuthRequest> {
        let request = self.build_request(redirect_to)?;
        persistence.set(Some(PendingRedirect {
            provider_id: self.provider_id.clone(),
            operation,
            code_verifier: request.pkce().map(|pair| pair.code_verifier().to_string()),
        }))?;

        if let Err(err) = handler.initiate_redirect(request.clone()) {
            persistence.set(None)?;
            return Err(err);
        }
        Ok(request)
    }
}
