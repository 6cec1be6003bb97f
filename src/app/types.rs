use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::platform::environment::default_app_config_json;

pub(crate) const DEFAULT_ANALYTICS_ADMIN_ENDPOINT: &str = "https://analyticsadmin.googleapis.com";

/// Connection settings for the hosted backend and the dashboard itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NexusOptions {
    /// Base URL of the backend project (identity service and data store).
    pub project_url: String,
    /// Public API key sent as the `apikey` header.
    pub anon_key: String,
    /// Public origin of the dashboard, used to build OAuth `redirect_to` targets.
    pub site_url: String,
    /// Overrides the Google Analytics Admin API origin.
    pub analytics_admin_endpoint: Option<String>,
    /// Organization stamped on every integration row written by this client.
    pub organization_id: Option<String>,
}

impl NexusOptions {
    fn from_json(map: &Map<String, Value>) -> Self {
        let field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        };

        Self {
            project_url: field(&["projectUrl", "project_url"]).unwrap_or_default(),
            anon_key: field(&["anonKey", "anon_key", "apiKey"]).unwrap_or_default(),
            site_url: field(&["siteUrl", "site_url"]).unwrap_or_default(),
            analytics_admin_endpoint: field(&["analyticsAdminEndpoint", "analytics_admin_endpoint"]),
            organization_id: field(&["organizationId", "organization_id"]),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.project_url.is_empty() && self.anon_key.is_empty() && self.site_url.is_empty()
    }
}

/// Returns options assembled from `NEXUS_CONFIG` or the defaults file, if any.
pub fn get_default_app_config() -> Option<NexusOptions> {
    let map = default_app_config_json()?;
    let options = NexusOptions::from_json(&map);
    if options.is_empty() {
        None
    } else {
        Some(options)
    }
}

/// Client-side routes the callback flows navigate to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routes {
    pub login: String,
    pub squads: String,
    /// Template containing a `{project_id}` placeholder.
    pub project_integrations: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            squads: "/squads".to_string(),
            project_integrations: "/projects/{project_id}/integrations".to_string(),
        }
    }
}

impl Routes {
    pub fn project_integrations(&self, project_id: &str) -> String {
        self.project_integrations.replace("{project_id}", project_id)
    }
}

/// Grace periods applied by the callback flows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallbackTimings {
    /// How long an error stays on screen before navigating back.
    pub failure_redirect_delay: Duration,
    /// How long a success message stays on screen before navigating on.
    pub success_redirect_delay: Duration,
    /// Bounded wait for the identity session to settle after a redirect.
    pub session_settle_delay: Duration,
}

impl Default for CallbackTimings {
    fn default() -> Self {
        Self {
            failure_redirect_delay: Duration::from_secs(3),
            success_redirect_delay: Duration::from_secs(2),
            session_settle_delay: Duration::from_millis(1500),
        }
    }
}

impl CallbackTimings {
    /// Timings without any delay, for tests and headless drivers.
    pub fn immediate() -> Self {
        Self {
            failure_redirect_delay: Duration::ZERO,
            success_redirect_delay: Duration::ZERO,
            session_settle_delay: Duration::ZERO,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NexusApp {
    inner: Arc<NexusAppInner>,
}

#[derive(Debug)]
struct NexusAppInner {
    options: NexusOptions,
    routes: Routes,
    timings: CallbackTimings,
}

impl NexusApp {
    pub(crate) fn new(options: NexusOptions, routes: Routes, timings: CallbackTimings) -> Self {
        Self {
            inner: Arc::new(NexusAppInner {
                options,
                routes,
                timings,
            }),
        }
    }

    pub fn options(&self) -> &NexusOptions {
        &self.inner.options
    }

    pub fn routes(&self) -> &Routes {
        &self.inner.routes
    }

    pub fn timings(&self) -> CallbackTimings {
        self.inner.timings
    }

    /// Returns a copy of this app with different callback timings.
    pub fn with_timings(&self, timings: CallbackTimings) -> Self {
        Self::new(self.inner.options.clone(), self.inner.routes.clone(), timings)
    }

    /// Returns a copy of this app with different client-side routes.
    pub fn with_routes(&self, routes: Routes) -> Self {
        Self::new(self.inner.options.clone(), routes, self.inner.timings)
    }

    /// Joins `path` onto the backend project URL.
    pub(crate) fn project_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.inner.options.project_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn analytics_admin_endpoint(&self) -> String {
        self.inner
            .options
            .analytics_admin_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ANALYTICS_ADMIN_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Absolute URL of a hash-router route on the dashboard.
    pub(crate) fn site_route(&self, route: &str) -> String {
        format!(
            "{}/#{}",
            self.inner.options.site_url.trim_end_matches('/'),
            route
        )
    }
}
