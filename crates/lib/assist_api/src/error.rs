//! Application error types.

use assist_core::auth::AuthError;
use assist_core::auth::rbac::AccessDenied;
use assist_core::store::StoreError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Full text of an internal error, carried on the response so the
/// error-detail layer can decide whether the client sees it.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token invalid")]
    TokenInvalid,

    #[error("Refresh token not found")]
    TokenNotFound,

    #[error("Refresh token revoked")]
    TokenRevoked,

    #[error("Forbidden")]
    Forbidden,

    #[error("Cross-site request rejected")]
    CsrfRejected,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::Unauthenticated
            | AppError::TokenExpired
            | AppError::TokenInvalid
            | AppError::TokenNotFound
            | AppError::TokenRevoked => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::CsrfRejected => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Unauthenticated => "unauthenticated",
            AppError::TokenExpired => "token_expired",
            AppError::TokenInvalid => "token_invalid",
            AppError::TokenNotFound => "token_not_found",
            AppError::TokenRevoked => "token_revoked",
            AppError::Forbidden => "forbidden",
            AppError::CsrfRejected => "csrf_rejected",
            AppError::NotFound(_) => "not_found",
            AppError::Timeout => "timeout",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Validation(m) | AppError::NotFound(m) => m.clone(),
            AppError::InvalidCredentials => "Invalid CPF or password".into(),
            AppError::Unauthenticated => "Authentication required".into(),
            AppError::TokenExpired => "Token expired".into(),
            AppError::TokenInvalid => "Invalid token".into(),
            AppError::TokenNotFound => "Refresh token not found".into(),
            AppError::TokenRevoked => "Refresh token revoked".into(),
            AppError::Forbidden => "Insufficient permissions".into(),
            AppError::CsrfRejected => "Cross-site request rejected".into(),
            AppError::Timeout => "Request timed out".into(),
            AppError::RateLimited { .. } => "Too many requests, try again later".into(),
            AppError::Internal(_) => "Internal server error".into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message: self.message(),
            detail: None,
        });
        let mut response = (self.status(), body).into_response();
        match self {
            AppError::RateLimited { retry_after_secs } => {
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
            }
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                response.extensions_mut().insert(InternalErrorDetail(detail));
            }
            _ => {}
        }
        response
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::TokenExpired => AppError::TokenExpired,
            AuthError::TokenInvalid => AppError::TokenInvalid,
            AuthError::TokenNotFound => AppError::TokenNotFound,
            AuthError::TokenRevoked => AppError::TokenRevoked,
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::Store(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<AccessDenied> for AppError {
    fn from(e: AccessDenied) -> Self {
        match e {
            AccessDenied::Unauthenticated => AppError::Unauthenticated,
            AccessDenied::Forbidden => AppError::Forbidden,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}
