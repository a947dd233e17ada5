//! Session administration.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::sanitize::SanitizedParams;
use crate::models::RevokedSessionsResponse;
use crate::services::auth;

/// `DELETE /api/users/{id}/sessions`: revoke every refresh token of a user.
pub async fn revoke_sessions_handler(
    State(state): State<AppState>,
    params: SanitizedParams,
) -> AppResult<Json<RevokedSessionsResponse>> {
    let user_id: i64 = params.parse("id")?;
    let revoked = auth::revoke_sessions(&state, user_id).await?;
    Ok(Json(RevokedSessionsResponse { revoked }))
}
