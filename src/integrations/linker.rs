use std::sync::Arc;

use chrono::Utc;

use crate::app::NexusApp;
use crate::integrations::error::{IntegrationError, IntegrationResult};
use crate::integrations::inventory::AnalyticsAdminClient;
use crate::integrations::model::{
    Ga4Property, Integration, IntegrationMetadata, IntegrationProvider, IntegrationStatus,
    IntegrationUpsert, PropertyMetadata, TokenMetadata,
};
use crate::integrations::store::IntegrationStore;

/// The property list offered to the user and the one they picked.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertySelection {
    properties: Vec<Ga4Property>,
    selected: Option<usize>,
}

impl PropertySelection {
    pub fn new(properties: Vec<Ga4Property>) -> Self {
        Self {
            properties,
            selected: None,
        }
    }

    pub fn properties(&self) -> &[Ga4Property] {
        &self.properties
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Selects the entry with the same property resource name. Returns whether one matched.
    pub fn select(&mut self, property: &Ga4Property) -> bool {
        match self
            .properties
            .iter()
            .position(|candidate| candidate.property == property.property)
        {
            Some(index) => {
                self.selected = Some(index);
                true
            }
            None => false,
        }
    }

    pub fn select_index(&mut self, index: usize) -> bool {
        if index < self.properties.len() {
            self.selected = Some(index);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&Ga4Property> {
        self.selected.and_then(|index| self.properties.get(index))
    }
}

/// Links projects to remote analytics properties and keeps the integration rows.
pub struct IntegrationLinker {
    store: Arc<dyn IntegrationStore>,
    inventory: AnalyticsAdminClient,
    organization_id: Option<String>,
}

impl IntegrationLinker {
    pub fn new(app: &NexusApp, store: Arc<dyn IntegrationStore>) -> Self {
        Self {
            store,
            inventory: AnalyticsAdminClient::new(app),
            organization_id: app.options().organization_id.clone(),
        }
    }

    pub fn with_inventory(mut self, inventory: AnalyticsAdminClient) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn inventory(&self) -> &AnalyticsAdminClient {
        &self.inventory
    }

    /// Properties readable with `provider_token`. Writes nothing.
    pub async fn list_remote_properties(
        &self,
        provider_token: &str,
    ) -> IntegrationResult<Vec<Ga4Property>> {
        if provider_token.is_empty() {
            return Err(IntegrationError::NoProviderToken);
        }
        self.inventory.list_properties(provider_token).await
    }

    /// Records `property` as the project's active GA4 source, replacing any earlier choice.
    pub async fn confirm_link(
        &self,
        project_id: &str,
        property: &Ga4Property,
    ) -> IntegrationResult<Integration> {
        let metadata = IntegrationMetadata::Property(PropertyMetadata::from(property));
        let integration = self.upsert_active(project_id, metadata).await?;
        log::info!(
            "linked project {project_id} to {} ({})",
            property.property,
            property.property_display_name
        );
        Ok(integration)
    }

    /// Stores provider tokens for the project's GA4 integration.
    pub async fn capture_tokens(
        &self,
        project_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> IntegrationResult<Integration> {
        if access_token.is_empty() {
            return Err(IntegrationError::NoProviderToken);
        }
        let metadata = IntegrationMetadata::Tokens(TokenMetadata {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.filter(|t| !t.is_empty()).map(str::to_string),
            connected_at: Utc::now(),
        });
        let integration = self.upsert_active(project_id, metadata).await?;
        log::info!("captured provider tokens for project {project_id}");
        Ok(integration)
    }

    /// Marks the integration inactive. The row and its metadata stay.
    pub async fn disconnect(&self, integration_id: &str) -> IntegrationResult<Integration> {
        let integration = self
            .store
            .set_status(integration_id, IntegrationStatus::Inactive)
            .await?;
        log::info!("disconnected integration {integration_id}");
        Ok(integration)
    }

    pub async fn integrations(&self, project_id: &str) -> IntegrationResult<Vec<Integration>> {
        self.store.list_for_project(project_id).await
    }

    pub async fn active_integration(
        &self,
        project_id: &str,
        provider: IntegrationProvider,
    ) -> IntegrationResult<Option<Integration>> {
        Ok(self
            .integrations(project_id)
            .await?
            .into_iter()
            .find(|row| row.provider == provider && row.is_active()))
    }

    pub async fn is_connected(
        &self,
        project_id: &str,
        provider: IntegrationProvider,
    ) -> IntegrationResult<bool> {
        Ok(self.active_integration(project_id, provider).await?.is_some())
    }

    async fn upsert_active(
        &self,
        project_id: &str,
        metadata: IntegrationMetadata,
    ) -> IntegrationResult<Integration> {
        if project_id.is_empty() {
            return Err(IntegrationError::MissingProjectId);
        }
        self.store
            .upsert(IntegrationUpsert {
                project_id: project_id.to_string(),
                provider: IntegrationProvider::Ga4,
                status: IntegrationStatus::Active,
                metadata,
                organization_id: self.organization_id.clone(),
            })
            .await
    }
}
