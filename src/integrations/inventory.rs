use std::collections::HashSet;

use reqwest::Client;
use serde::Deserialize;

use crate::app::NexusApp;
use crate::integrations::error::{IntegrationError, IntegrationResult};
use crate::integrations::model::Ga4Property;

/// Upper bound on inventory pages fetched for one listing.
pub const MAX_INVENTORY_PAGES: usize = 50;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountSummariesResponse {
    #[serde(default)]
    account_summaries: Vec<AccountSummary>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountSummary {
    account: String,
    #[serde(default)]
    display_name: String,
    /// Absent for accounts without properties.
    #[serde(default)]
    property_summaries: Option<Vec<PropertySummary>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertySummary {
    property: String,
    #[serde(default)]
    display_name: String,
}

/// Reads the GA4 account inventory visible to a provider token.
#[derive(Clone)]
pub struct AnalyticsAdminClient {
    client: Client,
    endpoint: String,
}

impl AnalyticsAdminClient {
    pub fn new(app: &NexusApp) -> Self {
        Self::with_endpoint(app.analytics_admin_endpoint())
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Lists every property across every account, in the order the API returns them.
    ///
    /// A non-success status is reported as [`IntegrationError::ProviderApi`],
    /// which usually means the token lacks the analytics scope. Paging stops at
    /// a repeated page token or after [`MAX_INVENTORY_PAGES`] pages.
    pub async fn list_properties(&self, provider_token: &str) -> IntegrationResult<Vec<Ga4Property>> {
        let mut properties = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        for _ in 0..MAX_INVENTORY_PAGES {
            let page = self.fetch_page(provider_token, page_token.as_deref()).await?;
            properties.extend(flatten(page.account_summaries));
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(next) if seen_tokens.insert(next.clone()) => page_token = Some(next),
                Some(next) => {
                    log::warn!("inventory repeated page token {next}; stopping");
                    page_token = None;
                    break;
                }
                None => {
                    page_token = None;
                    break;
                }
            }
        }
        if page_token.is_some() {
            log::warn!("inventory listing stopped after {MAX_INVENTORY_PAGES} pages");
        }

        log::debug!("inventory returned {} properties", properties.len());
        Ok(properties)
    }

    async fn fetch_page(
        &self,
        provider_token: &str,
        page_token: Option<&str>,
    ) -> IntegrationResult<AccountSummariesResponse> {
        let url = format!("{}/v1beta/accountSummaries", self.endpoint);
        let mut request = self.client.get(url).bearer_auth(provider_token);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|err| IntegrationError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("inventory request failed with status {status}");
            return Err(IntegrationError::ProviderApi {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<AccountSummariesResponse>()
            .await
            .map_err(|err| IntegrationError::Network(format!("Invalid inventory response: {err}")))
    }
}

fn flatten(accounts: Vec<AccountSummary>) -> impl Iterator<Item = Ga4Property> {
    accounts.into_iter().flat_map(|account| {
        let AccountSummary {
            account,
            display_name,
            property_summaries,
        } = account;
        property_summaries
            .unwrap_or_default()
            .into_iter()
            .map(move |summary| Ga4Property {
                account: account.clone(),
                account_display_name: display_name.clone(),
                property: summary.property,
                property_display_name: summary.display_name,
            })
    })
}
