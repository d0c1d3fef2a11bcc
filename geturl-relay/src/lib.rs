// Provisioning relay: one short-lived container instance per request.
// The binary and the integration tests both build the app from here.

pub mod api_docs;
pub mod app;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod forward;
pub mod handlers;
pub mod provider_manager;
pub mod provisioning;
pub mod relay;
pub mod routes;
pub mod shutdown;
pub mod sweep_job;
pub mod wait;

pub use app::AppState;
pub use config::RelayConfig;
pub use relay::Relay;
