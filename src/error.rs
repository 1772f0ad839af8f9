//! Request error taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing, malformed, or expired bearer credential.
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),

    /// Requested channel name does not match `private-chat-<digits>-<digits>`.
    #[error("invalid channel name: {0}")]
    InvalidChannel(String),

    /// Authenticated caller is not a participant of the chat/channel.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("not found: {0}")]
    NotFound(&'static str),

    /// Rejected request body, e.g. blank message content.
    #[error("validation: {0}")]
    Validation(&'static str),

    /// Caller exceeded the send throttle window.
    #[error("rate limited")]
    RateLimited,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidChannel(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::InvalidChannel(_) => "INVALID_CHANNEL",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        // Internal detail stays in the log, not the body.
        let message = match &self {
            AppError::Database(_) | AppError::Internal(_) => "internal error".to_owned(),
            other => other.to_string(),
        };
        let body = Json(json!({ "error": self.code(), "message": message }));
        (status, body).into_response()
    }
}
