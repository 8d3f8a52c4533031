//! Error types for the Fulfillment API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use milkway_core::FulfillmentError;
use serde::Serialize;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
#[allow(dead_code)] // Variants used for future error handling
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Missing or malformed actor identity")]
    InvalidActor,

    #[error("Fulfillment error")]
    Fulfillment(#[from] FulfillmentError),

    #[error("Database error")]
    Database(#[from] milkway_db::DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidActor => StatusCode::UNAUTHORIZED,
            Self::Fulfillment(err) => StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvalidActor => "INVALID_ACTOR",
            Self::Fulfillment(err) => err.error_code(),
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Fulfillment(err) => err.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.message(), "request failed");
        }
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.message(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;
