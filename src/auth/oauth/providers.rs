use super::provider::OAuthProvider;
use crate::app::NexusApp;

pub const GOOGLE_PROVIDER_ID: &str = "google";

/// Scopes requested by a plain dashboard sign-in.
pub const IDENTITY_SCOPES: [&str; 3] = ["openid", "profile", "email"];
pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
pub const ADWORDS_SCOPE: &str = "https://www.googleapis.com/auth/adwords";

const AUTHORIZE_PATH: &str = "/auth/v1/authorize";

/// Google sign-in brokered by the identity service's authorize endpoint.
pub struct GoogleAuthProvider;

impl GoogleAuthProvider {
    /// Provider for signing in to the dashboard.
    pub fn for_app(app: &NexusApp) -> OAuthProvider {
        let mut provider =
            OAuthProvider::new(GOOGLE_PROVIDER_ID, app.project_endpoint(AUTHORIZE_PATH));
        provider
            .set_scope_parameter("scopes")
            .add_scopes(IDENTITY_SCOPES)
            .set_custom_parameter("provider", GOOGLE_PROVIDER_ID)
            .enable_pkce();
        provider
    }

    /// Provider that asks again for consent including the analytics data scopes.
    ///
    /// Offline access is requested so the provider returns a refresh token.
    pub fn with_data_scopes(app: &NexusApp) -> OAuthProvider {
        let mut provider = Self::for_app(app);
        provider
            .add_scopes([ANALYTICS_READONLY_SCOPE, ADWORDS_SCOPE])
            .set_custom_parameter("access_type", "offline")
            .set_custom_parameter("prompt", "consent");
        provider
    }

    /// Adds a `login_hint` so the account chooser preselects `hint`.
    pub fn add_login_hint(provider: &mut OAuthProvider, hint: &str) {
        provider.set_custom_parameter("login_hint", hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{CallbackTimings, NexusOptions, Routes};
    use std::collections::BTreeMap;
    use url::Url;

    fn app() -> NexusApp {
        NexusApp::new(
            NexusOptions {
                project_url: "https://demo.supabase.co".into(),
                anon_key: "anon".into(),
                site_url: "https://app.example.com".into(),
                ..Default::default()
            },
            Routes::default(),
            CallbackTimings::default(),
        )
    }

    #[test]
    fn data_scope_request_targets_authorize_endpoint() {
        let provider = GoogleAuthProvider::with_data_scopes(&app());
        let request = provider
            .build_request("https://app.example.com/#/projects/pj-1/integrations")
            .unwrap();
        let url = Url::parse(&request.auth_url).unwrap();
        let pairs: BTreeMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/auth/v1/authorize");
        assert_eq!(pairs["provider"], "google");
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["prompt"], "consent");
        assert_eq!(
            pairs["scopes"],
            format!("openid profile email {ANALYTICS_READONLY_SCOPE} {ADWORDS_SCOPE}")
        );
        assert!(pairs.contains_key("code_challenge"));
    }

    #[test]
    fn sign_in_request_only_asks_identity_scopes() {
        let mut provider = GoogleAuthProvider::for_app(&app());
        GoogleAuthProvider::add_login_hint(&mut provider, "demo@nexus.com");
        assert_eq!(provider.scopes(), ["openid", "profile", "email"]);
        assert_eq!(provider.custom_parameters()["login_hint"], "demo@nexus.com");
    }
}
