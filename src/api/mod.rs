use axum::Router;

use crate::infra::state::AppState;

pub mod greeting;

/// Constructs the REST API, without middleware.
pub fn api(state: AppState) -> Router {
    Router::new()
        .merge(greeting::greeting_api::routes())
        .with_state(state)
}
