//! The axum application: routes, middleware and server startup.
//!
//! # Examples
//!
//! Greeting API.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! # let url = greeting_api::app::spawn_app().await;
//! let response = reqwest::get(format!("{}/test", url)).await.unwrap();
//! assert_eq!(200, response.status());
//! assert_eq!("Hello Word", response.text().await.unwrap());
//! # });
//! ```

use std::iter;

use crate::infra::error::{ApiError, PanicHandler};
use crate::infra::middleware::MakeRequestIdSpan;
use crate::infra::openapi::ApiDoc;
use crate::infra::shutdown::shutdown_signal;
use crate::infra::{
    config::{Config, ServerConfig},
    state::AppState,
};
use axum::error_handling::HandleErrorLayer;
use axum::response::IntoResponse;
use axum::Router;
use http::header::AUTHORIZATION;
use tokio::net::TcpListener;
use tower::{limit::GlobalConcurrencyLimitLayer, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Applies the request timeout and the global concurrency limit.
///
/// Requests arriving while the limit is saturated are shed with a 503 instead of queueing.
/// The timeout wraps the limit, so no request outlives `request_timeout`.
pub(crate) fn with_limits(router: Router, server: &ServerConfig) -> Router {
    // Fallible middleware from tower, mapped to infallible response with [`HandleErrorLayer`].
    let tower_middleware = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e| async move {
            ApiError::from_middleware(e).into_response()
        }))
        .timeout(server.request_timeout)
        .load_shed()
        .layer(GlobalConcurrencyLimitLayer::new(server.concurrency_limit));
    router.layer(tower_middleware)
}

/// Constructs the full axum application.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .merge(SwaggerUi::new("/api/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .nest("/api", crate::api::api(state.clone()));

    with_limits(router, &state.config().server)
        // Layers
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(MakeRequestIdSpan)
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG))
                .on_failure(()),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveRequestHeadersLayer::new(iter::once(
            AUTHORIZATION,
        )))
        .layer(CatchPanicLayer::custom(PanicHandler))
}

/// Starts the axum server.
pub async fn run_app(listener: TcpListener, config: Config) -> std::io::Result<()> {
    let state = AppState::new(config);
    let app = app(state).into_make_service();

    tracing::info!("Starting axum on {}", listener.local_addr()?);
    let exit_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    match &exit_result {
        Ok(_) => tracing::info!("Successfully shut down"),
        Err(e) => tracing::error!("Shutdown failed: {}", e),
    }

    exit_result
}

/// Spawn a server on a random port.
///
/// Returns the base URL of the API, e.g. `http://127.0.0.1:1234/api`.
pub async fn spawn_app() -> String {
    let address = "127.0.0.1";
    let listener = TcpListener::bind(format!("{address}:0")).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = crate::infra::config::load_config().unwrap();
    tokio::spawn(run_app(listener, config));
    format!("http://{address}:{port}/api")
}
