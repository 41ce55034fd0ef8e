use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Request body is too large")]
    PayloadTooLarge,

    #[error("Too many attempts; try again shortly")]
    RateLimited,

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Map a unique-constraint violation to a 409 with the given message.
    pub fn conflict_on_unique(e: SqlxError, msg: &str) -> Self {
        if let SqlxError::Database(db) = &e
            && db.is_unique_violation()
        {
            return Self::Conflict(msg.to_string());
        }
        Self::Database(e)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Csv(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Provider(_) | AppError::Reqwest(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_)
            | AppError::Json(_)
            | AppError::Hash(_)
            | AppError::Mail(_)
            | AppError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(e: lettre::error::Error) -> Self {
        AppError::Mail(e.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(e: lettre::address::AddressError) -> Self {
        AppError::Mail(e.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        AppError::Mail(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(_)
            | AppError::Json(_)
            | AppError::Hash(_)
            | AppError::Mail(_)
            | AppError::Task(_) => {
                error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            AppError::Reqwest(_) => {
                error!(error = %self, "upstream request failed");
                "Payment provider is unavailable".to_string()
            }
            AppError::Token(_) => "Invalid or expired token".to_string(),
            _ => self.to_string(),
        };
        (status, Json(ApiErrorBody { error: message })).into_response()
    }
}

/// Error body shared by every failing route: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_not_leaked() {
        let resp = AppError::Mail("smtp password rejected".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(AppError::NotFound("Watch").to_string(), "Watch not found");
        assert_eq!(AppError::NotFound("Watch").status(), StatusCode::NOT_FOUND);
    }
}
