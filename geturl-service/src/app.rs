use crate::config::ServiceConfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Arc<Self> {
        Arc::new(Self { config })
    }
}

/// Create CORS layer with permissive settings
pub fn create_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
