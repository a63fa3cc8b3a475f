// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// Every domain failure is one of these kinds; none of them should ever
/// surface as a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Purchase required: {0}")]
    Forbidden(String),

    #[error("Course not available: {0}")]
    NotAvailable(String),

    #[error("Course full: {0}")]
    Capacity(String),

    #[error("Already enrolled: {0}")]
    DuplicateEnrollment(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
            }
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, "purchase_required", Some(msg.clone()))
            }
            AppError::NotAvailable(msg) => (
                StatusCode::FORBIDDEN,
                "course_not_available",
                Some(msg.clone()),
            ),
            AppError::Capacity(msg) => (StatusCode::CONFLICT, "course_full", Some(msg.clone())),
            AppError::DuplicateEnrollment(msg) => {
                (StatusCode::CONFLICT, "already_enrolled", Some(msg.clone()))
            }
            AppError::InvalidState(msg) => {
                (StatusCode::CONFLICT, "invalid_state", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
