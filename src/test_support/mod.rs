//! Test utilities shared across crate-level unit tests.

pub mod http;
pub mod nexus;

pub use http::start_mock_server;
pub use nexus::{test_app, test_app_with_organization};
