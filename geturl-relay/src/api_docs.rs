use crate::handlers;
use geturl_common::{ErrorBody, RelayRequest, UrlResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::get_url, handlers::health),
    components(schemas(RelayRequest, UrlResponse, ErrorBody, handlers::HealthResponse)),
    tags(
        (name = "Relay", description = "Per-request container provisioning"),
        (name = "Health", description = "Liveness probe")
    )
)]
pub struct ApiDoc;
