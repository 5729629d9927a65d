use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error taxonomy.
///
/// Validation errors carry a stable code and are surfaced verbatim.
/// `ConcurrentModification` is retried inside the lifecycle manager and only
/// reaches the wire after retry exhaustion. `Internal` is logged with full
/// context and surfaced as a generic failure.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid price: {0}")]
    InvalidPrice(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Insufficient margin: {0}")]
    InsufficientMargin(String),
    #[error("Margin below allocated: {0}")]
    MarginBelowAllocated(String),
    #[error("Concurrent modification of operation {0}")]
    ConcurrentModification(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for the wire format.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidQuantity(_) => "InvalidQuantity",
            AppError::InvalidPrice(_) => "InvalidPrice",
            AppError::NotFound(_) => "NotFound",
            AppError::Forbidden(_) => "Forbidden",
            AppError::InsufficientMargin(_) => "InsufficientMargin",
            AppError::MarginBelowAllocated(_) => "MarginBelowAllocated",
            AppError::ConcurrentModification(_) => "ConcurrentModification",
            AppError::BadRequest(_) => "BadRequest",
            AppError::Config(_) => "Config",
            AppError::Internal(_) => "Internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            AppError::InvalidQuantity(msg) | AppError::InvalidPrice(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::InsufficientMargin(msg) | AppError::MarginBelowAllocated(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg)
            }
            AppError::ConcurrentModification(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
