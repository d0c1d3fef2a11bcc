use crate::handlers;
use geturl_common::{ErrorBody, NameRequest, UrlResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::get_url, handlers::health),
    components(schemas(NameRequest, UrlResponse, ErrorBody)),
    tags(
        (name = "Resources", description = "Resource URL generation"),
        (name = "Health", description = "Liveness probe")
    )
)]
pub struct ApiDoc;
