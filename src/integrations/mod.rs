//! Project-scoped marketing integrations.
//!
//! [`IntegrationLinker`] reads the Google Analytics 4 inventory visible to a
//! provider token and records the chosen property in an [`IntegrationStore`].
//! When the token cannot read the inventory, [`ScopeEscalationTrigger`] sends
//! the user back to the provider with the analytics scopes. [`ConnectFlow`]
//! ties both together for the integrations page and [`IntegrationCallback`]
//! handles the token-capture redirect.

mod callback;
mod error;
mod escalation;
mod flow;
mod inventory;
mod linker;
mod model;
mod store;

#[doc(inline)]
pub use callback::{IntegrationCallback, IntegrationOutcome, PROJECT_QUERY_PARAM};

#[doc(inline)]
pub use error::{IntegrationError, IntegrationResult};

#[doc(inline)]
pub use escalation::{EscalationOutcome, EscalationReason, Evaluation, ScopeEscalationTrigger};

#[doc(inline)]
pub use flow::{ConnectFlow, ToggleOutcome};

#[doc(inline)]
pub use inventory::AnalyticsAdminClient;

#[doc(inline)]
pub use linker::{IntegrationLinker, PropertySelection};

#[doc(inline)]
pub use model::{
    Ga4Property, Integration, IntegrationMetadata, IntegrationProvider, IntegrationStatus,
    IntegrationUpsert, PropertyMetadata, TokenMetadata,
};

#[doc(inline)]
pub use store::{InMemoryIntegrationStore, IntegrationStore, RestIntegrationStore};
