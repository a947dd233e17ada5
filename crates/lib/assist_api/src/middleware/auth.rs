//! Authentication and role authorization middleware.

use assist_core::auth::rbac::{RoleSet, check_access};
use assist_core::models::auth::Principal;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Verified principal, stored in request extensions by [`authenticate`] and
/// copied onto the response for outer layers.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthenticated)
}

/// Extracts `Authorization: Bearer <token>`, verifies it, and injects
/// [`AuthenticatedUser`] into request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    let principal = state.tokens.verify_access_token(token).map_err(|e| {
        debug!(error = %e, "access token rejected");
        AppError::from(e)
    })?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser(principal.clone()));
    let mut response = next.run(request).await;
    response
        .extensions_mut()
        .insert(AuthenticatedUser(principal));
    Ok(response)
}

/// Admits the request only if the authenticated role is in the state's
/// [`RoleSet`]. Must run inside [`authenticate`].
pub async fn authorize(
    State(allowed): State<RoleSet>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| &user.0);
    check_access(principal, &allowed)?;
    Ok(next.run(request).await)
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_auth(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_scheme_required() {
        assert_eq!(bearer_token(&with_auth("Bearer abc.def")).unwrap(), "abc.def");
        assert!(matches!(
            bearer_token(&with_auth("Basic dXNlcjpwYXNz")),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            bearer_token(&with_auth("Bearer ")),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AppError::Unauthenticated)
        ));
    }
}
