//! App configuration shared by the auth and integrations services.
mod api;
mod errors;
mod types;

#[doc(inline)]
pub use api::{initialize_app, SDK_VERSION};

#[doc(inline)]
pub use errors::{AppError, AppResult};

#[doc(inline)]
pub use types::{get_default_app_config, CallbackTimings, NexusApp, NexusOptions, Routes};
