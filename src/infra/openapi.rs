//! OpenAPI configuration.

use crate::api::greeting::greeting_api;

/// OpenApi configuration.
#[derive(utoipa::OpenApi)]
#[openapi(
    paths(greeting_api::hello_word),
    components(schemas(crate::infra::error::ErrorBody)),
    tags((name = "test", description = "Greeting endpoint"))
)]
#[derive(Clone, Copy, Debug)]
pub struct ApiDoc;
