use crate::service::ServiceError;
use crate::vector::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Wire-level error: `{"error": <machine code>, "message": <human text>}`.
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.code,
                "message": self.message,
            })),
        )
            .into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, "invalid_argument", message)
            }
            ServiceError::Store(store_err) => store_err.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::DimensionMismatch { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "dimension_mismatch", err.to_string())
            }
            StoreError::NotFound => {
                ApiError::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            StoreError::Persistence(_) => {
                tracing::error!(error = %err, "durable write failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_failure",
                    "durable write failed",
                )
            }
            StoreError::MetricMismatch { .. } | StoreError::Corrupt(_) => {
                tracing::error!(error = %err, "store in unexpected state");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "store in unexpected state",
                )
            }
        }
    }
}
