use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use geturl_common::{ErrorBody, RelayRequest, UrlResponse};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::RelayError;

/// Provision an instance, forward the request to it and return its answer.
#[utoipa::path(
    post,
    path = "/api/get_url",
    tag = "Relay",
    request_body = RelayRequest,
    responses(
        (status = 200, description = "Body returned by the instance", body = UrlResponse),
        (status = 400, description = "Missing \"name\" or \"id\"", body = ErrorBody),
        (status = 500, description = "Instance not created or never ready", body = ErrorBody),
        (status = 502, description = "Instance did not answer successfully", body = ErrorBody)
    )
)]
pub async fn get_url(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return RelayError::MalformedBody(e.to_string()).into_response(),
    };

    match state.relay.handle(value).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
    pub location: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Relay is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = state.relay.config();
    Json(HealthResponse {
        status: "ok".to_string(),
        provider: format!("{:?}", config.provider).to_lowercase(),
        location: config.location.clone(),
    })
}
