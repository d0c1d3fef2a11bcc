use crate::api_docs::ApiDoc;
use crate::app::AppState;
use crate::handlers;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use utoipa::OpenApi;

/// Routes follow the Functions custom handler layout: the function name is
/// served under `/api`.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/get_url", post(handlers::get_url))
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state)
}
