//! Rate-limit middleware for the general, auth and strict policies.

use std::time::Duration;

use assist_core::rate_limit::{Decision, Policy};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::client::client_meta;
use crate::AppState;
use crate::error::AppError;

static RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
static RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
static RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Every route except health checks.
pub async fn general_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state, Policy::General, request, next).await
}

/// Login and token refresh. Only failed attempts count.
pub async fn auth_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state, Policy::Auth, request, next).await
}

/// Sensitive mutating endpoints.
pub async fn strict_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state, Policy::Strict, request, next).await
}

async fn enforce(
    state: &AppState,
    policy: Policy,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if policy.exempts(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let client = client_meta(
        request.headers(),
        request.extensions(),
        state.config.trust_proxy,
    )
    .ip;
    let mut decision = state.limiter.check(policy, &client).await?;
    if !decision.allowed {
        warn!(policy = policy.name(), %client, path = %request.uri().path(), "rate limit exceeded");
        return Err(AppError::RateLimited {
            retry_after_secs: ceil_secs(decision.resets_in),
        });
    }

    let mut response = next.run(request).await;

    if policy.refunds(response.status().as_u16()) {
        match state.limiter.refund(policy, &client).await {
            Ok(()) => decision.remaining = (decision.remaining + 1).min(decision.limit),
            Err(e) => warn!(policy = policy.name(), error = %e, "rate limit refund failed"),
        }
    }

    set_headers(response.headers_mut(), &decision);
    Ok(response)
}

fn set_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(RATELIMIT_LIMIT.clone(), HeaderValue::from(decision.limit));
    headers.insert(
        RATELIMIT_REMAINING.clone(),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        RATELIMIT_RESET.clone(),
        HeaderValue::from(ceil_secs(decision.resets_in)),
    );
}

/// Whole seconds, rounded up, never below one.
fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}
