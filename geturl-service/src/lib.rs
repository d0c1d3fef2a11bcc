// Library entry point for the resource name service.
// The binary and the router tests both build the app from here.

pub mod api_docs;
pub mod app;
pub mod config;
pub mod handlers;
pub mod routes;

pub use app::AppState;
pub use config::ServiceConfig;
