//! Error types for the request cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Fetch Error Enum ==
/// Outcome of a failed fetch.
///
/// A cache miss is not an error and never shows up here. The type is `Clone`
/// because a single settled fetch is delivered to every caller that joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The origin (backing service) reported a failure
    #[error("{0}")]
    Origin(String),

    /// An attempt did not complete within the configured duration
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The shared producer went away before settling
    #[error("Fetch aborted: {0}")]
    Aborted(String),

    /// The worker pool was closed while the caller was waiting for a slot
    #[error("Worker pool is closed")]
    PoolClosed,
}

impl FetchError {
    /// Shorthand for an origin failure carrying the given message.
    pub fn origin(msg: impl Into<String>) -> Self {
        FetchError::Origin(msg.into())
    }

    /// Returns true for errors raised by the per-attempt timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}

// == Api Error Enum ==
/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The underlying fetch failed
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Fetch(FetchError::Origin(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Fetch(FetchError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Fetch(FetchError::Aborted(_) | FetchError::PoolClosed) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for fetch paths.
pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_message_preserved() {
        let err = FetchError::origin("upstream returned 500");
        assert_eq!(err.to_string(), "upstream returned 500");
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_is_timeout() {
        assert!(FetchError::Timeout(Duration::from_millis(10)).is_timeout());
    }

    #[test]
    fn test_status_mapping() {
        let resp = ApiError::InvalidRequest("bad".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError::from(FetchError::origin("boom")).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let resp = ApiError::from(FetchError::Timeout(Duration::from_secs(1))).into_response();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);

        let resp = ApiError::from(FetchError::PoolClosed).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
