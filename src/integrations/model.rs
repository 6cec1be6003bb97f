use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marketing data source a project can be linked to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrationProvider {
    #[serde(rename = "ga4", alias = "google_analytics")]
    Ga4,
    #[serde(rename = "google-ads", alias = "google_ads")]
    GoogleAds,
    #[serde(rename = "meta-ads", alias = "meta_ads")]
    MetaAds,
}

impl IntegrationProvider {
    pub const ALL: [IntegrationProvider; 3] = [
        IntegrationProvider::Ga4,
        IntegrationProvider::GoogleAds,
        IntegrationProvider::MetaAds,
    ];

    /// Value written to the `provider` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationProvider::Ga4 => "ga4",
            IntegrationProvider::GoogleAds => "google-ads",
            IntegrationProvider::MetaAds => "meta-ads",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            IntegrationProvider::Ga4 => "Google Analytics 4",
            IntegrationProvider::GoogleAds => "Google Ads",
            IntegrationProvider::MetaAds => "Meta Ads",
        }
    }

    /// Only GA4 can be linked today.
    pub fn is_available(&self) -> bool {
        matches!(self, IntegrationProvider::Ga4)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    #[serde(alias = "connected")]
    Active,
    #[serde(alias = "disconnected")]
    Inactive,
}

/// The GA4 property a project reports from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub property_id: String,
    pub property_name: String,
    pub account_id: String,
    pub account_name: String,
}

/// Provider tokens captured by the token-capture callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub connected_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntegrationMetadata {
    Property(PropertyMetadata),
    Tokens(TokenMetadata),
    Other(Value),
}

impl Default for IntegrationMetadata {
    fn default() -> Self {
        IntegrationMetadata::Other(Value::Null)
    }
}

impl IntegrationMetadata {
    pub fn property(&self) -> Option<&PropertyMetadata> {
        match self {
            IntegrationMetadata::Property(property) => Some(property),
            _ => None,
        }
    }

    pub fn tokens(&self) -> Option<&TokenMetadata> {
        match self {
            IntegrationMetadata::Tokens(tokens) => Some(tokens),
            _ => None,
        }
    }
}

/// A row of the `integrations` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub project_id: String,
    pub provider: IntegrationProvider,
    pub status: IntegrationStatus,
    #[serde(default)]
    pub metadata: IntegrationMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Integration {
    pub fn is_active(&self) -> bool {
        self.status == IntegrationStatus::Active
    }
}

/// Values written by an upsert keyed on `(project_id, provider)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntegrationUpsert {
    pub project_id: String,
    pub provider: IntegrationProvider,
    pub status: IntegrationStatus,
    pub metadata: IntegrationMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

/// A GA4 property as offered to the user, flattened from the account inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ga4Property {
    /// Account resource name, e.g. `accounts/1000`.
    pub account: String,
    pub account_display_name: String,
    /// Property resource name, e.g. `properties/2000`.
    pub property: String,
    pub property_display_name: String,
}

impl From<&Ga4Property> for PropertyMetadata {
    fn from(property: &Ga4Property) -> Self {
        Self {
            property_id: property.property.clone(),
            property_name: property.property_display_name.clone(),
            account_id: property.account.clone(),
            account_name: property.account_display_name.clone(),
        }
    }
}
