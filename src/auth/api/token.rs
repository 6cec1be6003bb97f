use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::app::NexusApp;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::model::{Session, SessionUser};

#[derive(Debug, Serialize)]
struct PkceExchangeRequest<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshTokenRequest<'a> {
    refresh_token: &'a str,
}

/// The identity service reports errors in a few different shapes.
#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

fn with_api_key(app: &NexusApp, builder: RequestBuilder) -> RequestBuilder {
    builder.header("apikey", &app.options().anon_key)
}

pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorResponse>(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| format!("request failed with status {status}"))
}

/// `POST /auth/v1/token?grant_type=pkce`
pub(crate) async fn exchange_pkce_code(
    client: &Client,
    app: &NexusApp,
    auth_code: &str,
    code_verifier: &str,
) -> AuthResult<Session> {
    let url = app.project_endpoint("/auth/v1/token?grant_type=pkce");
    let response = with_api_key(app, client.post(url))
        .json(&PkceExchangeRequest {
            auth_code,
            code_verifier,
        })
        .send()
        .await
        .map_err(|err| AuthError::Network(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::CodeExchangeFailed(error_message(status, &body)));
    }

    response
        .json::<Session>()
        .await
        .map_err(|err| AuthError::CodeExchangeFailed(err.to_string()))
}

/// `POST /auth/v1/token?grant_type=refresh_token`
pub(crate) async fn refresh_session(
    client: &Client,
    app: &NexusApp,
    refresh_token: &str,
) -> AuthResult<Session> {
    let url = app.project_endpoint("/auth/v1/token?grant_type=refresh_token");
    let response = with_api_key(app, client.post(url))
        .json(&RefreshTokenRequest { refresh_token })
        .send()
        .await
        .map_err(|err| AuthError::Network(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::SessionEstablishFailed(error_message(status, &body)));
    }

    response
        .json::<Session>()
        .await
        .map_err(|err| AuthError::SessionEstablishFailed(err.to_string()))
}

/// `GET /auth/v1/user`, validating `access_token` on the way.
pub(crate) async fn fetch_user(
    client: &Client,
    app: &NexusApp,
    access_token: &str,
) -> AuthResult<SessionUser> {
    let url = app.project_endpoint("/auth/v1/user");
    let response = with_api_key(app, client.get(url))
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|err| AuthError::Network(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::SessionEstablishFailed(error_message(status, &body)));
    }

    response
        .json::<SessionUser>()
        .await
        .map_err(|err| AuthError::SessionEstablishFailed(err.to_string()))
}

/// `POST /auth/v1/logout`
pub(crate) async fn logout(client: &Client, app: &NexusApp, access_token: &str) -> AuthResult<()> {
    let url = app.project_endpoint("/auth/v1/logout");
    let response = with_api_key(app, client.post(url))
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|err| AuthError::Network(err.to_string()))?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::Network(error_message(status, &body)))
    }
}
