//! Error handling module
//!
//! Provides unified error types and handling for the entire application.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Authentication failures. All of them surface as 401 and the messages are
/// deliberately coarse.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("No token provided")]
    NoToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    Deactivated,
}

impl AuthError {
    fn code(&self) -> &'static str {
        match self {
            AuthError::NoToken => "MISSING_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Deactivated => "ACCOUNT_DEACTIVATED",
        }
    }
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid role")]
    InvalidRole,

    #[error("Validation failed")]
    InvalidFields(Vec<String>),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl AppError {
    /// Status code this error maps to on the wire.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::MissingFields(_)
            | AppError::InvalidRole
            | AppError::InvalidFields(_)
            | AppError::Validation(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message, details) = match self {
            AppError::Database(e) => {
                error!("Database error: {:?}", e);
                ("DATABASE_ERROR", "A database error occurred".to_string(), None)
            }
            AppError::Pool(e) => {
                error!("Pool error: {:?}", e);
                ("POOL_EXHAUSTED", "Database connection pool exhausted".to_string(), None)
            }
            AppError::MissingFields(fields) => (
                "VALIDATION_ERROR",
                format!("Missing required fields: {}", fields.join(", ")),
                None,
            ),
            AppError::InvalidRole => ("INVALID_ROLE", "Invalid role".to_string(), None),
            AppError::InvalidFields(reasons) => (
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(reasons),
            ),
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg, None),
            AppError::NotFound(msg) => ("NOT_FOUND", msg, None),
            AppError::Conflict(msg) => ("CONFLICT", msg, None),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg, None),
            AppError::Auth(e) => (e.code(), e.to_string(), None),
            AppError::Forbidden(msg) => ("INSUFFICIENT_PERMISSIONS", msg, None),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                ("INTERNAL_ERROR", "An internal error occurred".to_string(), None)
            }
            AppError::Config(msg) => {
                error!("Configuration error: {}", msg);
                ("CONFIG_ERROR", "A configuration error occurred".to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: message,
            code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a not found error
pub fn not_found_error(msg: impl Into<String>) -> AppError {
    AppError::NotFound(msg.into())
}

/// Helper function to create a conflict error
pub fn conflict_error(msg: impl Into<String>) -> AppError {
    AppError::Conflict(msg.into())
}
