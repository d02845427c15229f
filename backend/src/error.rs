//! Error handling for the print supplies inventory
//!
//! Every failure leaves the API as `{success: false, error}` with a status
//! code matching its class. Internal details are logged, never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Client input errors
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Table not allowed: {0}")]
    TableNotAllowed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Authorization errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Backup errors
    #[error("Backup failed: {0}")]
    BackupFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}

impl From<shared::DateFilterError> for AppError {
    fn from(error: shared::DateFilterError) -> Self {
        AppError::ValidationError(error.to_string())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::MissingParameter(_)
            | AppError::InvalidAction(_)
            | AppError::TableNotAllowed(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::BackupFailed(_)
            | AppError::Io(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the caller
    pub fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg) => msg.clone(),
            AppError::MissingParameter(name) => format!("Missing required parameter: {}", name),
            AppError::InvalidAction(action) => format!("Invalid action: {}", action),
            AppError::TableNotAllowed(table) => format!("Table '{}' is not allowed", table),
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::InsufficientPermissions => {
                "You do not have permission to perform this action".to_string()
            }
            AppError::BackupFailed(_) => "The backup could not be completed".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::Io(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                "An internal server error occurred".to_string()
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_internal() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (status, Json(ErrorResponse::new(self.public_message()))).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_by_class() {
        assert_eq!(AppError::MissingParameter("q".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("no".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InsufficientPermissions.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = AppError::Internal("connection to 10.0.0.5 refused".into());
        assert!(!err.public_message().contains("10.0.0.5"));

        let err = AppError::ValidationError("Invalid month: 13".into());
        assert_eq!(err.public_message(), "Invalid month: 13");
    }
}
