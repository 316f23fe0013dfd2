// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Business-rule failures (`Conflict`, `NotFound`, `Validation`) are always
//! returned to the caller with their message. Backend failures are passed
//! through verbatim to the logs but never masked as business failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Uniqueness violation on register or rename.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Missing or malformed required field.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The persistence backend failed independently of business rules.
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for failures caused by the caller's input rather than the system.
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            AppError::Conflict(_) | AppError::NotFound(_) | AppError::Validation(_)
        )
    }
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
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Backend(msg) => {
                tracing::error!(error = %msg, "Backend error");
                (StatusCode::INTERNAL_SERVER_ERROR, "backend_error", None)
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

/// Result type alias for handlers and store operations
pub type Result<T> = std::result::Result<T, AppError>;
