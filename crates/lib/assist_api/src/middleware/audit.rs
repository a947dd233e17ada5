//! Request audit: one structured event per request, plus persisted entries
//! for authenticated state changes.

use assist_core::models::audit::{AuditAction, AuditEntry};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;
use tracing::{info, warn};

use super::auth::AuthenticatedUser;
use super::client::client_meta;
use crate::AppState;

/// Logs method, path, status, duration, client and principal once the
/// response is produced. Successful CREATE/UPDATE/DELETE requests by an
/// authenticated principal under `/api` are also persisted.
pub async fn audit_log(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = client_meta(
        request.headers(),
        request.extensions(),
        state.config.trust_proxy,
    );

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let actor = response
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.0.subject_id);
    let user = actor.map_or_else(|| "anonymous".to_string(), |id| id.to_string());
    let user_agent = client.user_agent.as_deref().unwrap_or("-");

    if status.as_u16() >= 400 {
        warn!(
            target: "assist_api::audit",
            %method, %path, status = status.as_u16(), duration_ms,
            ip = %client.ip, user_agent, %user,
            "request"
        );
    } else {
        info!(
            target: "assist_api::audit",
            %method, %path, status = status.as_u16(), duration_ms,
            ip = %client.ip, user_agent, %user,
            "request"
        );
    }

    if let Some(actor) = actor
        && status.is_success()
        && let Some(action) = persisted_action(method.as_str())
        && let Some((resource, resource_id)) = resource_of(&path)
    {
        let mut entry = AuditEntry::new(action, resource, &client).actor(actor);
        if let Some(id) = resource_id {
            entry = entry.resource_id(id);
        }
        state.audit.record(entry);
    }

    response
}

fn persisted_action(method: &str) -> Option<AuditAction> {
    AuditAction::from_method(method)
        .filter(|a| matches!(a, AuditAction::Create | AuditAction::Update | AuditAction::Delete))
}

/// `/api/<resource>/<id>/...` split into resource and optional id.
fn resource_of(path: &str) -> Option<(&str, Option<&str>)> {
    let mut segments = path
        .strip_prefix("/api/")?
        .split('/')
        .filter(|s| !s.is_empty());
    let resource = segments.next()?;
    Some((resource, segments.next()))
}
