use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use super::json_response;
use crate::core::ValidationError;
use crate::resilience::ServiceError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Everything an HTTP handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error(transparent)]
    Upstream(#[from] ServiceError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UnknownService(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(err) => {
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => "validation_error",
            ApiError::RateLimited => "rate_limited",
            ApiError::UnknownService(_) => "unknown_service",
            ApiError::Upstream(ServiceError::Timeout { .. }) => "upstream_timeout",
            ApiError::Upstream(ServiceError::Unavailable { .. }) => "upstream_unavailable",
            ApiError::Upstream(ServiceError::Rejected { .. }) => "upstream_rejected",
            ApiError::Upstream(ServiceError::CircuitOpen { .. }) => "circuit_open",
            ApiError::Upstream(ServiceError::Other { .. }) | ApiError::Internal(_) => {
                "internal_error"
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // rejected upstream bodies pass through untouched
            ApiError::Upstream(ServiceError::Rejected { body, .. }) => {
                let mut response = (status, body.clone()).into_response();
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response
                    .headers_mut()
                    .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
                return response;
            }
            ApiError::Upstream(ServiceError::CircuitOpen { .. }) => {
                "Service temporarily degraded, please retry shortly".to_string()
            }
            ApiError::Upstream(ServiceError::Other { .. }) | ApiError::Internal(_) => {
                error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        json_response(
            status,
            ErrorResponse {
                error: message,
                code: self.code(),
            },
        )
    }
}
