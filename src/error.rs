// src/error.rs

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the whole service. Every failure that crosses the HTTP
/// boundary is one of these kinds; the JSON body carries a stable `kind` tag
/// so clients can branch without parsing messages.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    AlreadyTerminal(String),

    /// External system unreachable or timed out. Retryable.
    #[error("{0}")]
    GatewayUnavailable(String),

    /// External system explicitly declined. Not retryable without new input.
    #[error("{0}")]
    GatewayRejected(String),

    #[error("{0}")]
    Config(String),

    /// Store-level failure. Retryable.
    #[error("storage error: {0}")]
    Persistence(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::AlreadyTerminal(_) => "already_terminal",
            ApiError::GatewayUnavailable(_) => "gateway_unavailable",
            ApiError::GatewayRejected(_) => "gateway_rejected",
            ApiError::Config(_) => "config_error",
            ApiError::Persistence(_) => "persistence_error",
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        ApiError::Persistence(value.to_string())
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) | ApiError::GatewayRejected(_) => StatusCode::BAD_REQUEST,
            ApiError::AlreadyTerminal(_) => StatusCode::CONFLICT,
            ApiError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Config(_) | ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }))
    }
}
