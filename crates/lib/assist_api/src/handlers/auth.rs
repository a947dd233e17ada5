//! Authentication request handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::client::Client;
use crate::models::{LoginRequest, MeResponse, RefreshRequest, TokenResponse};
use crate::services::auth;
use crate::services::cookies::{REFRESH_COOKIE, clear_refresh_cookie, refresh_cookie};

/// Refresh token from the JSON body, falling back to the refresh cookie.
fn presented_refresh_token(body: &Bytes, jar: &CookieJar) -> AppResult<Option<String>> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(body)
            .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))?
            .refresh_token
    };
    Ok(from_body.filter(|t| !t.is_empty()).or_else(|| {
        jar.get(REFRESH_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }))
}

/// `POST /auth/login`: authenticate with CPF + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Client(client): Client,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let Json(body) = body?;
    let session = auth::login(&state, &body.cpf, &body.password, &client).await?;
    let cookie = refresh_cookie(
        &session.response.refresh_token,
        session.refresh_max_age_secs,
        state.config.cookie_secure,
    );
    Ok((jar.add(cookie), Json(session.response)))
}

/// `POST /auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Client(client): Client,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let token = presented_refresh_token(&body, &jar)?.ok_or(AppError::TokenNotFound)?;
    let session = auth::refresh(&state, &token, &client).await?;
    let cookie = refresh_cookie(
        &session.response.refresh_token,
        session.refresh_max_age_secs,
        state.config.cookie_secure,
    );
    Ok((jar.add(cookie), Json(session.response)))
}

/// `POST /auth/logout`: revoke the presented refresh token and clear the
/// cookie. Succeeds whether or not the token was live.
pub async fn logout_handler(
    State(state): State<AppState>,
    Client(client): Client,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<(CookieJar, StatusCode)> {
    let token = presented_refresh_token(&body, &jar)?;
    auth::logout(&state, token.as_deref(), &client).await?;
    let jar = jar.add(clear_refresh_cookie(state.config.cookie_secure));
    Ok((jar, StatusCode::NO_CONTENT))
}

/// `GET /auth/me`: the verified principal.
pub async fn me_handler(AuthenticatedUser(principal): AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse::from(&principal))
}
