use axum::extract::rejection::QueryRejection;
use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("No students to mark attendance for")]
    EmptyRoster,

    #[error("Upstream API error: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    InternalServerError,
}

/// Malformed or missing query parameters; every query on this API carries dates.
impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidDate(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::InvalidDate(msg) => (StatusCode::BAD_REQUEST, format!("Invalid date: {}", msg)),
            AppError::EmptyRoster => (
                StatusCode::BAD_REQUEST,
                "No students to mark attendance for".to_string(),
            ),
            AppError::Upstream(msg) => {
                warn!("upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (AppError::Conflict("paid".to_string()), StatusCode::CONFLICT),
            (AppError::InvalidDate("2025-13-01".to_string()), StatusCode::BAD_REQUEST),
            (AppError::EmptyRoster, StatusCode::BAD_REQUEST),
            (AppError::Upstream("timed out".to_string()), StatusCode::BAD_GATEWAY),
            (AppError::InternalServerError, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
