//! Audit log listing.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};

use crate::AppState;
use crate::error::AppResult;
use crate::models::{AuditLogEntry, AuditLogQuery};

const DEFAULT_LIMIT: i64 = 50;

/// `GET /api/audit-logs?limit=N`: most recent entries first.
pub async fn list_audit_logs_handler(
    State(state): State<AppState>,
    query: Result<Query<AuditLogQuery>, QueryRejection>,
) -> AppResult<Json<Vec<AuditLogEntry>>> {
    let Query(query) = query?;
    let entries = state
        .audit
        .recent(query.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(entries.into_iter().map(AuditLogEntry::from).collect()))
}
