//! Authentication and authorization logic.
//!
//! Provides password hashing, JWT signing, refresh-token handling, role
//! checks, and the [`service::TokenService`] that ties them to the stores.

pub mod jwt;
pub mod password;
pub mod rbac;
pub mod refresh;
pub mod service;

use thiserror::Error;

use crate::store::StoreError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token invalid")]
    TokenInvalid,

    #[error("Refresh token not found")]
    TokenNotFound,

    #[error("Refresh token revoked")]
    TokenRevoked,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
