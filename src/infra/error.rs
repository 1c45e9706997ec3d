//! Types for reporting errors that happened while serving a request.
//!
//! The greeting itself cannot fail, so everything here is about failures in
//! the surrounding middleware: timeouts, shed load and panics.

use axum::{
    http::HeaderValue,
    response::{IntoResponse, Response},
    BoxError, Json,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tower_http::catch_panic::ResponseForPanic;
use utoipa::ToSchema;

/// A standard error response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// A description of the error.
    message: String,
    /// When the error happened.
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    timestamp: OffsetDateTime,
}

impl ErrorBody {
    pub(crate) fn new(message: String) -> Self {
        Self {
            message,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        self.message.as_ref()
    }

    /// When the error happened.
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }
}

/// An error from our API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request took longer than the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// The concurrency limit was reached and the request was shed.
    #[error("service overloaded")]
    Overloaded,
    /// An internal error.
    #[error("{0}")]
    InternalError(#[from] InternalError),
}

impl ApiError {
    /// Maps an error raised by fallible tower middleware.
    pub fn from_middleware(e: BoxError) -> Self {
        if e.is::<tower::timeout::error::Elapsed>() {
            ApiError::Timeout
        } else if e.is::<tower::load_shed::error::Overloaded>() {
            ApiError::Overloaded
        } else {
            ApiError::InternalError(InternalError::Other(format!(
                "Tower middleware failed: {e}"
            )))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Timeout => {
                tracing::warn!("request timed out");
                let msg = self.to_string();
                (StatusCode::REQUEST_TIMEOUT, Json(ErrorBody::new(msg))).into_response()
            }
            ApiError::Overloaded => {
                tracing::warn!("concurrency limit reached, shedding request");
                let msg = self.to_string();
                let mut response =
                    (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorBody::new(msg))).into_response();
                response
                    .headers_mut()
                    .insert("Retry-After", HeaderValue::from_static("1"));
                response
            }
            ApiError::InternalError(e) => {
                tracing::error!("internal error: {}", e);
                e.into_response()
            }
        }
    }
}

/// An internal error.
/// The client cannot do anything about this.
#[derive(Debug, thiserror::Error)]
pub enum InternalError {
    /// Other miscellaneous errors.
    #[error("{0}")]
    Other(String),
}

impl IntoResponse for InternalError {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new("internal error".to_string())),
        )
            .into_response();
        response
            .headers_mut()
            .insert("Retry-After", HeaderValue::from_static("5"));
        response
    }
}

/// A handler for converting panics into proper responses for the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanicHandler;

impl ResponseForPanic for PanicHandler {
    type ResponseBody = axum::body::Body;

    fn response_for_panic(
        &mut self,
        err: Box<dyn std::any::Any + Send + 'static>,
    ) -> http::Response<Self::ResponseBody> {
        let details = err
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| err.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        ApiError::InternalError(InternalError::Other(format!("Panic: {details}"))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(response: Response) -> ErrorBody {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_error_hides_details_and_asks_for_retry() {
        let response = InternalError::Other("secret".to_string()).into_response();
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
        assert_eq!("5", response.headers()["retry-after"]);
        assert_eq!("internal error", body_of(response).await.message());
    }

    #[tokio::test]
    async fn elapsed_middleware_error_is_a_timeout() {
        let e: BoxError = Box::new(tower::timeout::error::Elapsed::new());
        let response = ApiError::from_middleware(e).into_response();
        assert_eq!(StatusCode::REQUEST_TIMEOUT, response.status());
        assert_eq!("request timed out", body_of(response).await.message());
    }

    #[tokio::test]
    async fn shed_requests_are_unavailable() {
        let e: BoxError = Box::new(tower::load_shed::error::Overloaded::new());
        let response = ApiError::from_middleware(e).into_response();
        assert_eq!(StatusCode::SERVICE_UNAVAILABLE, response.status());
        assert_eq!("1", response.headers()["retry-after"]);
        assert_eq!("service overloaded", body_of(response).await.message());
    }

    #[tokio::test]
    async fn other_middleware_errors_are_internal() {
        let e: BoxError = "overloaded".into();
        let response = ApiError::from_middleware(e).into_response();
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
    }

    #[test]
    fn panics_become_internal_errors() {
        let response = PanicHandler.response_for_panic(Box::new("boom"));
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
    }
}
