use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::TokenError;
use crate::store::{AccountError, LedgerError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("account store error: {0}")]
    Account(AccountError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::EmailTaken => AppError::EmailTaken,
            AccountError::NotFound => AppError::NotFound("account".to_string()),
            other => AppError::Account(other),
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &'static str, String) {
        match self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unauthenticated",
                "authentication required".to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_credentials",
                "invalid email or password".to_string(),
            ),
            AppError::InvalidToken | AppError::Token(TokenError::Malformed) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_token",
                "invalid or unknown token".to_string(),
            ),
            AppError::Token(TokenError::Expired) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "token_expired",
                "token expired".to_string(),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "forbidden",
                msg.clone(),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "validation_failed",
                msg.clone(),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "not_found",
                format!("{} not found", what),
            ),
            AppError::EmailTaken => (
                StatusCode::CONFLICT,
                "invalid_request_error",
                "email_taken",
                "email already registered".to_string(),
            ),
            AppError::Token(e) => {
                tracing::error!("Token error: {}", e);
                internal()
            }
            AppError::Ledger(e) => {
                tracing::error!("Ledger error: {}", e);
                internal()
            }
            AppError::Account(e) => {
                tracing::error!("Account store error: {}", e);
                internal()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                internal()
            }
        }
    }
}

fn internal() -> (StatusCode, &'static str, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal_server_error",
        "internal server error".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = self.parts();

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        let mut response = (status, body).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}
