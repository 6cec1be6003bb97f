#![cfg(not(target_arch = "wasm32"))]

use std::collections::BTreeMap;
use std::sync::Arc;

use httpmock::prelude::*;
use nexus_rs_sdk::app::{initialize_app, CallbackTimings, NexusApp, NexusOptions};
use nexus_rs_sdk::auth::{
    InMemoryIdentityProvider, InMemoryRedirectPersistence, PendingRedirect,
    RecordingRedirectHandler, RedirectOperation, RedirectPersistence, Session, SessionResolver,
    SessionUser,
};
use nexus_rs_sdk::integrations::{
    ConnectFlow, IntegrationLinker, IntegrationProvider, RestIntegrationStore,
    ScopeEscalationTrigger, ToggleOutcome,
};
use nexus_rs_sdk::platform::RecordingNavigator;
use serde_json::json;
use url::Url;

fn app_for(server: &MockServer) -> NexusApp {
    initialize_app(NexusOptions {
        project_url: server.base_url(),
        anon_key: "anon-key".into(),
        site_url: "https://dashboard.example.com".into(),
        analytics_admin_endpoint: Some(server.base_url()),
        organization_id: Some("org-9".into()),
    })
    .expect("initialize app")
    .with_timings(CallbackTimings::immediate())
}

struct Dashboard {
    handler: Arc<RecordingRedirectHandler>,
    redirects: Arc<InMemoryRedirectPersistence>,
    flow: ConnectFlow,
}

fn dashboard(app: &NexusApp, provider_token: Option<&str>) -> Dashboard {
    let identity = Arc::new(InMemoryIdentityProvider::new());
    identity.publish_session(Session {
        access_token: "user-jwt".into(),
        refresh_token: "user-rt".into(),
        expires_in: Some(3600),
        user: SessionUser {
            id: "usr-1".into(),
            ..SessionUser::default()
        },
        provider_token: provider_token.map(str::to_string),
        provider_refresh_token: None,
    });

    let store = Arc::new(RestIntegrationStore::new(app.clone()).with_identity(identity.clone()));
    let linker = Arc::new(IntegrationLinker::new(app, store));
    let handler = Arc::new(RecordingRedirectHandler::default());
    let redirects = InMemoryRedirectPersistence::shared();
    let trigger = Arc::new(ScopeEscalationTrigger::new(
        app.clone(),
        handler.clone(),
        redirects.clone(),
    ));
    let flow = ConnectFlow::new(
        app.clone(),
        linker,
        trigger,
        Arc::new(SessionResolver::new(identity)),
        Arc::new(RecordingNavigator::default()),
    );
    Dashboard {
        handler,
        redirects,
        flow,
    }
}

async fn mock_no_rows(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/integrations")
                .query_param("project_id", "eq.pj-1");
            then.status(200).json_body(json!([]));
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn rejected_preflight_escalates_scopes_without_listing() {
    let server = MockServer::start_async().await;
    mock_no_rows(&server).await;
    let preflight = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1beta/accountSummaries")
                .header("authorization", "Bearer ya29-narrow");
            then.status(403).json_body(json!({
                "error": {"code": 403, "status": "PERMISSION_DENIED"}
            }));
        })
        .await;

    let app = app_for(&server);
    let dashboard = dashboard(&app, Some("ya29-narrow"));

    let outcome = dashboard
        .flow
        .toggle("pj-1", IntegrationProvider::Ga4)
        .await
        .unwrap();

    assert_eq!(preflight.hits_async().await, 1);
    let ToggleOutcome::Escalated(request) = outcome else {
        panic!("expected a scope escalation");
    };
    let url = Url::parse(&request.auth_url).unwrap();
    assert_eq!(url.path(), "/auth/v1/authorize");
    let pairs: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs["provider"], "google");
    assert_eq!(
        pairs["scopes"].split(' ').collect::<Vec<_>>(),
        vec![
            "openid",
            "profile",
            "email",
            "https://www.googleapis.com/auth/analytics.readonly",
            "https://www.googleapis.com/auth/adwords",
        ]
    );
    assert_eq!(pairs["access_type"], "offline");
    assert_eq!(pairs["prompt"], "consent");
    assert_eq!(
        pairs["redirect_to"],
        "https://dashboard.example.com/#/projects/pj-1/integrations"
    );
    assert!(pairs.contains_key("code_challenge"));

    assert_eq!(dashboard.handler.requests().len(), 1);
    let pending: Option<PendingRedirect> = dashboard.redirects.get().unwrap();
    let pending = pending.expect("pending redirect recorded");
    assert_eq!(
        pending.operation,
        RedirectOperation::LinkIntegration {
            project_id: "pj-1".into()
        }
    );
    assert!(pending.code_verifier.is_some());
}

#[tokio::test(flavor = "current_thread")]
async fn selecting_second_property_links_it() {
    let server = MockServer::start_async().await;
    mock_no_rows(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1beta/accountSummaries");
            then.status(200).json_body(json!({
                "accountSummaries": [{
                    "account": "accounts/100",
                    "displayName": "Acme Corp",
                    "propertySummaries": [
                        {"property": "properties/1001", "displayName": "Marketing Site"},
                        {"property": "properties/1002", "displayName": "Mobile App"}
                    ]
                }]
            }));
        })
        .await;
    let upsert = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/integrations")
                .query_param("on_conflict", "project_id,provider")
                .header("authorization", "Bearer user-jwt")
                .json_body(json!({
                    "project_id": "pj-1",
                    "provider": "ga4",
                    "status": "active",
                    "organization_id": "org-9",
                    "metadata": {
                        "property_id": "properties/1002",
                        "property_name": "Mobile App",
                        "account_id": "accounts/100",
                        "account_name": "Acme Corp"
                    }
                }));
            then.status(201).json_body(json!([{
                "id": "3f1c",
                "project_id": "pj-1",
                "provider": "ga4",
                "status": "active",
                "organization_id": "org-9",
                "metadata": {
                    "property_id": "properties/1002",
                    "property_name": "Mobile App",
                    "account_id": "accounts/100",
                    "account_name": "Acme Corp"
                },
                "created_at": "2025-03-01T10:00:00Z"
            }]));
        })
        .await;

    let app = app_for(&server);
    let dashboard = dashboard(&app, Some("ya29-full"));

    let ToggleOutcome::Ready(mut selection) = dashboard
        .flow
        .toggle("pj-1", IntegrationProvider::Ga4)
        .await
        .unwrap()
    else {
        panic!("expected a property listing");
    };
    assert_eq!(selection.properties().len(), 2);
    assert!(selection.select_index(1));

    let row = dashboard.flow.confirm("pj-1", &selection).await.unwrap();

    upsert.assert_async().await;
    assert!(row.is_active());
    let metadata = row.metadata.property().expect("property metadata");
    assert_eq!(metadata.property_id, "properties/1002");
    assert_eq!(metadata.property_name, "Mobile App");
    assert!(dashboard.handler.requests().is_empty());
}
