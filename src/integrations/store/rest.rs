use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

use super::IntegrationStore;
use crate::app::NexusApp;
use crate::auth::IdentityProvider;
use crate::integrations::error::{IntegrationError, IntegrationResult};
use crate::integrations::model::{Integration, IntegrationStatus, IntegrationUpsert};

const TABLE_PATH: &str = "/rest/v1/integrations";

#[derive(Debug, Default, Deserialize)]
struct StoreErrorBody {
    message: Option<String>,
    details: Option<String>,
}

/// `integrations` table behind a PostgREST endpoint.
///
/// Requests carry the signed-in user's access token when an identity provider
/// is attached, so row-level security applies; otherwise the anon key is used.
pub struct RestIntegrationStore {
    app: NexusApp,
    client: Client,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl RestIntegrationStore {
    pub fn new(app: NexusApp) -> Self {
        Self {
            app,
            client: Client::new(),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let anon_key = &self.app.options().anon_key;
        let mut bearer = anon_key.clone();
        if let Some(identity) = &self.identity {
            if let Ok(Some(session)) = identity.get_session().await {
                bearer = session.access_token;
            }
        }
        builder.header("apikey", anon_key).bearer_auth(bearer)
    }

    async fn rows(response: Response) -> IntegrationResult<Vec<Integration>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<StoreErrorBody>(&body).unwrap_or_default();
            let message = match (parsed.message, parsed.details) {
                (Some(message), Some(details)) => format!("{message} ({details})"),
                (Some(message), None) => message,
                _ => format!("request failed with status {status}"),
            };
            return Err(IntegrationError::Persistence(message));
        }

        response
            .json::<Vec<Integration>>()
            .await
            .map_err(|err| IntegrationError::Persistence(format!("Invalid store response: {err}")))
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl IntegrationStore for RestIntegrationStore {
    async fn upsert(&self, row: IntegrationUpsert) -> IntegrationResult<Integration> {
        let url = self.app.project_endpoint(TABLE_PATH);
        let request = self
            .client
            .post(url)
            .query(&[("on_conflict", "project_id,provider")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row);
        let response = self
            .authorize(request)
            .await
            .send()
            .await
            .map_err(|err| IntegrationError::Network(err.to_string()))?;

        Self::rows(response).await?.into_iter().next().ok_or_else(|| {
            IntegrationError::Persistence("Store returned no row for the upsert".into())
        })
    }

    async fn set_status(
        &self,
        id: &str,
        status: IntegrationStatus,
    ) -> IntegrationResult<Integration> {
        let url = self.app.project_endpoint(TABLE_PATH);
        let request = self
            .client
            .patch(url)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&json!({ "status": status }));
        let response = self
            .authorize(request)
            .await
            .send()
            .await
            .map_err(|err| IntegrationError::Network(err.to_string()))?;

        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IntegrationError::NotFound(id.to_string()))
    }

    async fn list_for_project(&self, project_id: &str) -> IntegrationResult<Vec<Integration>> {
        let url = self.app.project_endpoint(TABLE_PATH);
        let request = self
            .client
            .get(url)
            .query(&[("select", "*".to_string()), ("project_id", format!("eq.{project_id}"))]);
        let response = self
            .authorize(request)
            .await
            .send()
            .await
            .map_err(|err| IntegrationError::Network(err.to_string()))?;

        Self::rows(response).await
    }
}
