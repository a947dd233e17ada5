//! Per-request deadline.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

/// Fails the request with 408 once `REQUEST_TIMEOUT_SECS` has elapsed.
pub async fn request_timeout(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();
    tokio::time::timeout(state.config.request_timeout, next.run(request))
        .await
        .map_err(|_| {
            warn!(%path, timeout = ?state.config.request_timeout, "request timed out");
            AppError::Timeout
        })
}
