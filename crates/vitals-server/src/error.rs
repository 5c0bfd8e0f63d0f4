//! API error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vitals_core::StoreError;

/// Result type for handler operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Marker extension set on responses whose failure was transient; the retry
/// middleware replays the request when it sees one.
#[derive(Debug, Clone, Copy)]
pub struct TransientFailure;

/// API error enum covering the handler error classes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 400 Bad Request
    #[error("Bad request: {0}")]
    BadRequest(String),

    // 404 Not Found
    #[error("{0} not found")]
    NotFound(String),

    // 500, retryable
    #[error("Transient failure: {0}")]
    Transient(String),

    // 500
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Transient(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic phrase sent to the client. Internal error text stays in the
    /// logs.
    fn client_phrase(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "Bad Request",
            Self::NotFound(_) => "Not found",
            Self::Transient(_) | Self::Internal(_) => "Internal Server Error",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, name } => Self::NotFound(format!("{kind} {name}")),
            StoreError::InvalidMetric(msg) => Self::BadRequest(msg),
            StoreError::Transient(msg) => Self::Transient(msg),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let mut response = (self.status_code(), self.client_phrase()).into_response();
        if matches!(self, Self::Transient(_)) {
            response.extensions_mut().insert(TransientFailure);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitals_core::MetricKind;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Transient("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_errors_convert() {
        let api: ApiError = StoreError::not_found(MetricKind::Gauge, "Temp").into();
        assert_eq!(api.status_code(), StatusCode::NOT_FOUND);

        let api: ApiError = StoreError::Transient("pool".into()).into();
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn transient_responses_carry_the_marker() {
        let response = ApiError::Transient("db".into()).into_response();
        assert!(response.extensions().get::<TransientFailure>().is_some());

        let response = ApiError::BadRequest("x".into()).into_response();
        assert!(response.extensions().get::<TransientFailure>().is_none());
    }
}
