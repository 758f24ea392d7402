use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Request budget exhausted. Carries enough to build the 429 headers.
    #[error("Rate limit exceeded")]
    RateLimited {
        limit: u32,
        reset_at: i64,
        retry_after_secs: i64,
    },

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Rate limiting carries headers the other variants don't need.
        if let AppError::RateLimited {
            limit,
            reset_at,
            retry_after_secs,
        } = &self
        {
            let body = ErrorResponse {
                error: "Rate limit exceeded".to_string(),
                details: Some(format!("Retry after {} seconds", retry_after_secs)),
            };
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [
                    (header::RETRY_AFTER, retry_after_secs.to_string()),
                    (
                        header::HeaderName::from_static("x-ratelimit-limit"),
                        limit.to_string(),
                    ),
                    (
                        header::HeaderName::from_static("x-ratelimit-remaining"),
                        "0".to_string(),
                    ),
                    (
                        header::HeaderName::from_static("x-ratelimit-reset"),
                        reset_at.to_string(),
                    ),
                ],
                Json(body),
            )
                .into_response();
        }

        let (status, error, details) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Validation failed", Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::RateLimited { .. } => unreachable!("handled above"),
            AppError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "Invalid signature", None)
            }
            AppError::Gateway(msg) => {
                tracing::error!("Gateway error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment gateway error", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Shorthand for `Option -> AppError::NotFound` chains in handlers.
pub trait OptionExt<T> {
    fn or_not_found(self, what: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, what: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(what.to_string()))
    }
}

/// Stable user-facing messages, kept in one place so tests can match on them.
pub mod msg {
    pub const TRANSACTION_NOT_FOUND: &str = "Transaction not found";
    pub const PAYMENT_NOT_FOUND: &str = "Payment not found";
    pub const CREATOR_NOT_FOUND: &str = "Creator not found";
    pub const INVALID_TRANSITION: &str = "Invalid payment state transition";
    pub const WEBHOOK_NOT_CONFIGURED: &str = "Webhook secret not configured for creator";
}

pub type Result<T> = std::result::Result<T, AppError>;
