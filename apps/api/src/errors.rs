use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid outcome: {0}")]
    InvalidOutcome(String),

    #[error("Pair already compared: {0}")]
    AlreadyCompared(String),

    /// Terminal signal, not a failure: the project has no pairs left to show.
    #[error("No more comparisons")]
    NoMoreComparisons,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::InvalidOutcome(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_OUTCOME", msg.clone())
            }
            AppError::AlreadyCompared(msg) => {
                (StatusCode::CONFLICT, "ALREADY_COMPARED", msg.clone())
            }
            AppError::NoMoreComparisons => (
                StatusCode::CONFLICT,
                "NO_MORE_COMPARISONS",
                "All comparisons for this project are complete".to_string(),
            ),
            AppError::Conflict(msg) => {
                let body = Json(json!({
                    "error": {
                        "code": "PAIR_CONFLICT",
                        "message": msg
                    }
                }));
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(header::RETRY_AFTER, "1")],
                    body,
                )
                    .into_response();
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
