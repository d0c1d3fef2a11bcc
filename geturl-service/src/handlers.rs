use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use geturl_common::{resource_url, ErrorBody, NameRequest, UrlResponse};
use serde_json::Value;
use std::sync::Arc;

use crate::app::AppState;

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(message))).into_response()
}

/// Generate the CDN URL for a resource name.
#[utoipa::path(
    post,
    path = "/get_url",
    tag = "Resources",
    request_body = NameRequest,
    responses(
        (status = 200, description = "Generated URL", body = UrlResponse),
        (status = 400, description = "Missing or invalid \"name\"", body = ErrorBody)
    )
)]
pub async fn get_url(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("rejecting non-JSON body: {}", e);
            return bad_request(format!("Request body must be valid JSON: {}", e));
        }
    };

    let req = match NameRequest::from_value(&value) {
        Ok(r) => r,
        Err(e) => return bad_request(e.to_string()),
    };

    let url = resource_url(&state.config.url_base, &req.name);
    tracing::debug!(name = %req.name, url = %url, "generated url");
    (StatusCode::OK, Json(UrlResponse { url })).into_response()
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn root() -> &'static str {
    "geturl resource name service"
}
