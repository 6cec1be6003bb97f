#![cfg(not(target_arch = "wasm32"))]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use nexus_rs_sdk::app::{initialize_app, CallbackTimings, NexusApp, NexusOptions};
use nexus_rs_sdk::auth::{
    AuthCallback, AuthContext, AuthError, CallbackOutcome, FilePersistence, IdentityPersistence,
    LocalUser, ResolutionPath, RestIdentityProvider,
};
use nexus_rs_sdk::platform::{NavigationEvent, RecordingNavigator};
use serde_json::json;

fn app_for(server: &MockServer) -> NexusApp {
    initialize_app(NexusOptions {
        project_url: server.base_url(),
        anon_key: "anon-key".into(),
        site_url: "https://dashboard.example.com".into(),
        ..Default::default()
    })
    .expect("initialize app")
}

fn identity_file(name: &str) -> PathBuf {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    std::env::temp_dir().join(format!(
        "nexus-{name}-{}-{}.json",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ))
}

#[tokio::test(flavor = "current_thread")]
async fn token_pair_redirect_signs_in_and_goes_to_squads() {
    let server = MockServer::start_async().await;
    let user = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/auth/v1/user")
                .header("apikey", "anon-key")
                .header("authorization", "Bearer AT1");
            then.status(200).json_body(json!({
                "id": "usr-1",
                "email": "ana@example.com",
                "user_metadata": {"full_name": "Ana Souza"}
            }));
        })
        .await;

    let app = app_for(&server).with_timings(CallbackTimings::immediate());
    let path = identity_file("token-pair");
    let persistence = Arc::new(FilePersistence::new(&path));
    let context = AuthContext::new(persistence);
    context.initialize().unwrap();

    let href = "https://dashboard.example.com/#/auth/callback#access_token=AT1&refresh_token=RT1";
    let navigator = Arc::new(RecordingNavigator::with_href(href));
    let identity = Arc::new(RestIdentityProvider::new(app.clone()));
    let callback = AuthCallback::new(identity, context.clone(), navigator.clone())
        .routes(app.routes().clone())
        .timings(app.timings());

    let outcome = callback.run().await;

    user.assert_async().await;
    let expected = LocalUser {
        id: "usr-1".into(),
        email: "ana@example.com".into(),
        name: "Ana Souza".into(),
    };
    match &outcome {
        CallbackOutcome::Authenticated { user, path, .. } => {
            assert_eq!(user, &expected);
            assert_eq!(*path, ResolutionPath::TokenPair);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(
        FilePersistence::new(&path).get().unwrap(),
        Some(expected.clone())
    );
    assert_eq!(context.current_user(), Some(expected));
    assert_eq!(
        navigator.events(),
        vec![
            NavigationEvent::Replaced("https://dashboard.example.com/#/auth/callback".into()),
            NavigationEvent::Navigated("/squads".into()),
        ]
    );

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "current_thread")]
async fn provider_error_redirect_returns_to_login_after_delay() {
    let server = MockServer::start_async().await;
    let any_call = server
        .mock_async(|when, then| {
            when.path_contains("/auth/v1/");
            then.status(500);
        })
        .await;

    let app = app_for(&server);
    let path = identity_file("provider-error");
    let context = AuthContext::new(Arc::new(FilePersistence::new(&path)));
    context.initialize().unwrap();
    let navigator = Arc::new(RecordingNavigator::default());
    let callback = AuthCallback::new(
        Arc::new(RestIdentityProvider::new(app.clone())),
        context.clone(),
        navigator.clone(),
    )
    .timings(app.timings());

    let outcome = callback
        .handle(
            "https://dashboard.example.com/?error=access_denied&error_description=User%20cancelled#/auth/callback",
        )
        .await;

    match outcome {
        CallbackOutcome::Failed {
            error,
            message,
            next,
        } => {
            assert_eq!(error, AuthError::ProviderDenied("User cancelled".into()));
            assert_eq!(message, "User cancelled");
            assert_eq!(next.route, "/login");
            assert_eq!(next.after, Duration::from_secs(3));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(any_call.hits_async().await, 0);
    assert!(!context.is_authenticated());
    assert_eq!(
        navigator.events(),
        vec![NavigationEvent::Replaced(
            "https://dashboard.example.com/#/auth/callback".into()
        )]
    );
}
