//! Custom error types for the receipt service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application error taxonomy
///
/// Validation and not-found errors surface directly to the caller;
/// persistence and filesystem failures prevent a transition from being
/// reported as successful; notification failures are advisory and are
/// normally carried as warnings rather than as this error.
#[derive(Error, Debug)]
pub enum AppError {
    /// Entity id does not resolve
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Capability or protected-id guard tripped
    #[error("Unauthorized")]
    Unauthorized,

    /// An admin attempted to revoke their own admin role
    #[error("Cannot revoke your own admin role")]
    SelfDemotion,

    /// An admin attempted to delete their own account
    #[error("Cannot delete your own account")]
    SelfDeletion,

    /// Password verification failed
    #[error("Invalid credentials")]
    InvalidCredential,

    /// Malformed input caught before reaching the core
    #[error("{0}")]
    Validation(String),

    /// The receipt's status changed since it was read
    #[error("Receipt was modified concurrently")]
    Conflict,

    /// Constraint violation, e.g. duplicate email or filename
    #[error("Constraint violation: {0}")]
    Persistence(String),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File move or write failure
    #[error("Filesystem error: {0}")]
    FileSystem(#[from] std::io::Error),

    /// Mail transport failure that could not be downgraded to a warning
    #[error("Notification error: {0}")]
    Notification(String),

    /// Anything else
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Unauthorized => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::SelfDemotion | AppError::SelfDeletion => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            AppError::InvalidCredential => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Conflict => (StatusCode::CONFLICT, self.to_string()),
            AppError::Persistence(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Database(_) | AppError::FileSystem(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            AppError::Notification(_) => (
                StatusCode::BAD_GATEWAY,
                "Failed to send notification".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for results in the receipt service
pub type AppResult<T> = Result<T, AppError>;
