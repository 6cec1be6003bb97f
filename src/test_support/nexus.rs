use crate::app::{CallbackTimings, NexusApp, NexusOptions, Routes};

pub const TEST_ANON_KEY: &str = "test-anon-key";
pub const TEST_SITE_URL: &str = "https://app.example.com";

/// App whose identity service, data store and analytics endpoint all point at `base_url`.
///
/// Timings are zeroed so callback flows do not sleep in tests.
pub fn test_app(base_url: &str) -> NexusApp {
    build(base_url, None)
}

pub fn test_app_with_organization(base_url: &str, organization_id: &str) -> NexusApp {
    build(base_url, Some(organization_id.to_string()))
}

fn build(base_url: &str, organization_id: Option<String>) -> NexusApp {
    NexusApp::new(
        NexusOptions {
            project_url: base_url.to_string(),
            anon_key: TEST_ANON_KEY.to_string(),
            site_url: TEST_SITE_URL.to_string(),
            analytics_admin_endpoint: Some(base_url.to_string()),
            organization_id,
        },
        Routes::default(),
        CallbackTimings::immediate(),
    )
}
