//! Authentication flows: login, refresh and logout over the token service,
//! with audit entries for session start and end.

use assist_core::auth::service::TokenPair;
use assist_core::models::audit::{AuditAction, AuditEntry};
use assist_core::models::auth::ClientMeta;
use chrono::Utc;
use tracing::info;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{AuthUser, MeResponse, TokenResponse};

/// Token response plus the refresh-token lifetime for the cookie.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub response: TokenResponse,
    pub refresh_max_age_secs: i64,
}

fn session(pair: TokenPair, user: Option<AuthUser>) -> IssuedSession {
    let expires_in = (pair.access.principal.expires_at - pair.access.principal.issued_at).num_seconds();
    let refresh_max_age_secs = (pair.refresh.expires_at - Utc::now()).num_seconds();
    IssuedSession {
        response: TokenResponse {
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
            token_type: "Bearer".to_string(),
            expires_in,
            principal: MeResponse::from(&pair.access.principal),
            user,
        },
        refresh_max_age_secs,
    }
}

/// Authenticate with CPF + password.
pub async fn login(
    state: &AppState,
    cpf: &str,
    password: &str,
    client: &ClientMeta,
) -> AppResult<IssuedSession> {
    let outcome = state.tokens.authenticate(cpf, password, client).await?;

    state.audit.record(
        AuditEntry::new(AuditAction::Login, "auth", client)
            .actor(outcome.user.id)
            .details(serde_json::json!({ "role": outcome.user.role })),
    );

    Ok(session(outcome.tokens, Some(AuthUser::from(&outcome.user))))
}

/// Exchange a refresh token for a new pair (single-use rotation).
pub async fn refresh(
    state: &AppState,
    refresh_token: &str,
    client: &ClientMeta,
) -> AppResult<IssuedSession> {
    let pair = state.tokens.rotate_refresh_token(refresh_token, client).await?;
    Ok(session(pair, None))
}

/// Revoke a refresh token. Idempotent.
pub async fn logout(
    state: &AppState,
    refresh_token: Option<&str>,
    client: &ClientMeta,
) -> AppResult<()> {
    let Some(token) = refresh_token else {
        return Ok(());
    };
    if let Some(owner_id) = state.tokens.revoke_refresh_token(token).await? {
        info!(user_id = owner_id, "user logged out");
        state
            .audit
            .record(AuditEntry::new(AuditAction::Logout, "auth", client).actor(owner_id));
    }
    Ok(())
}

/// Sign a user out of every session.
pub async fn revoke_sessions(state: &AppState, user_id: i64) -> AppResult<u64> {
    Ok(state.tokens.revoke_all_for_owner(user_id).await?)
}
