#![cfg(all(target_arch = "wasm32", feature = "wasm-web"))]

use std::sync::Arc;

use nexus_rs_sdk::app::{initialize_app, AppError, CallbackTimings, NexusOptions};
use nexus_rs_sdk::auth::{
    parse_redirect, AuthCallback, AuthContext, InMemoryIdentityProvider, InMemoryPersistence,
    PendingRedirect, RedirectOperation, RedirectPersistence, RestIdentityProvider,
    SessionUser, WebStorageDriver, WebStorageRedirectPersistence, PENDING_REDIRECT_KEY,
};
use nexus_rs_sdk::platform::RecordingNavigator;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn initialize_app_requires_options() {
    let result = initialize_app(NexusOptions::default());
    assert!(matches!(result, Err(AppError::NoOptions)));
}

#[wasm_bindgen_test]
fn parses_glued_fragment_tokens() {
    let fields = parse_redirect("https://app.example.com/#/auth/callback&access_token=AT1&refresh_token=RT1");
    assert_eq!(fields.access_token.as_deref(), Some("AT1"));
    assert_eq!(fields.refresh_token.as_deref(), Some("RT1"));
}

#[wasm_bindgen_test(async)]
async fn token_pair_signs_in_without_network() {
    let app = initialize_app(NexusOptions {
        project_url: "https://demo.supabase.co".into(),
        anon_key: "wasm-anon".into(),
        site_url: "https://app.example.com".into(),
        ..Default::default()
    })
    .expect("initialize app")
    .with_timings(CallbackTimings::immediate());

    let identity = Arc::new(InMemoryIdentityProvider::new());
    identity.register_access_token(
        "AT1",
        SessionUser {
            id: "usr-1".into(),
            email: Some("wasm@example.com".into()),
            ..SessionUser::default()
        },
    );
    let context = AuthContext::new(Arc::new(InMemoryPersistence::default()));
    context.initialize().expect("initialize context");
    let navigator = Arc::new(RecordingNavigator::default());

    let callback = AuthCallback::new(identity, context.clone(), navigator.clone())
        .timings(app.timings());
    let outcome = callback
        .handle("https://app.example.com/#/auth/callback#access_token=AT1&refresh_token=RT1")
        .await;

    assert!(outcome.is_authenticated());
    assert_eq!(
        context.current_user().map(|user| user.name),
        Some("wasm@example.com".to_string())
    );
}

#[wasm_bindgen_test]
fn pending_redirect_lives_in_session_storage() {
    let persistence = WebStorageRedirectPersistence::default();
    let pending = PendingRedirect {
        provider_id: "google".into(),
        operation: RedirectOperation::LinkIntegration {
            project_id: "pj-1".into(),
        },
        code_verifier: Some("verifier-123".into()),
    };
    persistence.set(Some(pending.clone())).expect("store pending redirect");

    let storage = web_sys::window()
        .and_then(|window| window.session_storage().ok().flatten())
        .expect("session storage");
    let raw = storage
        .get_item(PENDING_REDIRECT_KEY)
        .ok()
        .flatten()
        .expect("raw entry");
    assert!(raw.contains("verifier-123"));

    // A fresh handle sees what the page before the redirect wrote.
    let reloaded = WebStorageRedirectPersistence::new(WebStorageDriver::Session);
    assert_eq!(reloaded.take().expect("take"), Some(pending));
    assert_eq!(reloaded.get().expect("get"), None);
    assert!(storage.get_item(PENDING_REDIRECT_KEY).ok().flatten().is_none());
}

#[wasm_bindgen_test]
fn rest_identity_reads_the_verifier_from_session_storage() {
    let app = initialize_app(NexusOptions {
        project_url: "https://demo.supabase.co".into(),
        anon_key: "wasm-anon".into(),
        site_url: "https://app.example.com".into(),
        ..Default::default()
    })
    .expect("initialize app");

    WebStorageRedirectPersistence::default()
        .set(Some(PendingRedirect {
            provider_id: "google".into(),
            operation: RedirectOperation::SignIn,
            code_verifier: Some("verifier-456".into()),
        }))
        .expect("store pending redirect");

    let identity = RestIdentityProvider::new(app);
    let pending = identity
        .redirect_persistence()
        .take()
        .expect("take")
        .expect("pending redirect survives");
    assert_eq!(pending.code_verifier.as_deref(), Some("verifier-456"));
}
