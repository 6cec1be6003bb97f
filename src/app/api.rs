use url::Url;

use crate::app::errors::{AppError, AppResult};
use crate::app::types::{get_default_app_config, CallbackTimings, NexusApp, NexusOptions, Routes};

pub static SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

fn ensure_options(mut options: NexusOptions) -> AppResult<NexusOptions> {
    if options.is_empty() {
        if let Some(defaults) = get_default_app_config() {
            options = defaults;
        }
    }

    if options.is_empty() {
        return Err(AppError::NoOptions);
    }

    Ok(options)
}

fn validate_url(name: &'static str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::MissingOption(name));
    }
    let parsed = Url::parse(value).map_err(|err| AppError::InvalidOption {
        name,
        message: err.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AppError::InvalidOption {
            name,
            message: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Validates the options and returns an app handle with default routes and timings.
///
/// Empty options fall back to the `NEXUS_CONFIG` environment configuration.
pub fn initialize_app(options: NexusOptions) -> AppResult<NexusApp> {
    let options = ensure_options(options)?;

    validate_url("project_url", &options.project_url)?;
    validate_url("site_url", &options.site_url)?;
    if options.anon_key.trim().is_empty() {
        return Err(AppError::MissingOption("anon_key"));
    }
    if let Some(endpoint) = &options.analytics_admin_endpoint {
        validate_url("analytics_admin_endpoint", endpoint)?;
    }

    log::debug!(
        "initialized nexus app v{SDK_VERSION} for {}",
        options.project_url
    );
    Ok(NexusApp::new(options, Routes::default(), CallbackTimings::default()))
}
