//! Implementation of the greeting API. An API that always answers with the same greeting.

use crate::infra::state::AppState;
use axum::{routing::get, Router};

/// The body returned by [`hello_word`].
pub const GREETING: &str = "Hello Word";

/// The message logged once per call to [`hello_word`].
pub const GREETING_LOG: &str = "Este é um log de nível INFO na minha aplicação.";

/// The greeting API endpoints.
pub fn routes() -> Router<AppState> {
    Router::new().route("/test", get(hello_word))
}

/// A handler for requests to the greeting endpoint.
#[utoipa::path(
    get,
    path = "/api/test",
    tag = "test",
    responses(
        (status = 200, description = "Success", body = String, content_type = "text/plain", example = json!("Hello Word")),
    )
)]
pub async fn hello_word() -> &'static str {
    tracing::info!("{GREETING_LOG}");
    GREETING
}
