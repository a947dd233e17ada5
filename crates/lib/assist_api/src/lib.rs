//! # assist_api
//!
//! HTTP surface for Assist: the auth endpoints and the security middleware
//! stack, on axum.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use assist_core::audit::AuditLogger;
use assist_core::auth::rbac::RoleSet;
use assist_core::auth::service::TokenService;
use assist_core::models::auth::Role;
use assist_core::rate_limit::RateLimiter;
use assist_core::store::Stores;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use sqlx::PgPool;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::handlers::{audit, auth, health, sessions};
use crate::middleware::audit::audit_log;
use crate::middleware::auth::{authenticate, authorize};
use crate::middleware::errors::{error_detail, panic_response};
use crate::middleware::rate_limit::{auth_rate_limit, general_rate_limit, strict_rate_limit};
use crate::middleware::sanitize::sanitize_input;
use crate::middleware::security::{csrf_guard, security_headers};
use crate::middleware::timeout::request_timeout;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    pub tokens: Arc<TokenService>,
    pub audit: AuditLogger,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: ApiConfig, stores: Stores) -> Self {
        let tokens = TokenService::new(
            config.jwt_secret.as_bytes(),
            stores.users,
            stores.refresh_tokens,
            config.token_settings(),
        );
        Self {
            limiter: Arc::new(RateLimiter::new(stores.counters, config.rate_limits)),
            audit: AuditLogger::new(stores.audit),
            tokens: Arc::new(tokens),
            config: Arc::new(config),
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `assist_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    assist_core::migrate::migrate(pool).await
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".into())
}

/// Builds the Axum router with all routes, middleware and shared state.
pub fn router(state: AppState) -> Router {
    let health = Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/health", get(health::health_handler));

    // Login and refresh: only failed attempts count against the auth limit.
    let credentials = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route_layer(from_fn_with_state(state.clone(), auth_rate_limit));

    let public = Router::new().route("/auth/logout", post(auth::logout_handler));

    let me = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    // Route layers run last-added first: authenticate wraps authorize.
    let audit_logs = Router::new()
        .route("/api/audit-logs", get(audit::list_audit_logs_handler))
        .route_layer(from_fn_with_state(
            RoleSet::of([Role::Secretary, Role::Coordinator]),
            authorize,
        ))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let user_sessions = Router::new()
        .route(
            "/api/users/{id}/sessions",
            delete(sessions::revoke_sessions_handler),
        )
        .route_layer(from_fn_with_state(RoleSet::of([Role::Secretary]), authorize))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
        .route_layer(from_fn_with_state(state.clone(), strict_rate_limit));

    Router::new()
        .merge(health)
        .merge(credentials)
        .merge(public)
        .merge(me)
        .merge(audit_logs)
        .merge(user_sessions)
        .fallback(not_found)
        .layer(from_fn(sanitize_input))
        .layer(from_fn_with_state(state.clone(), general_rate_limit))
        .layer(from_fn_with_state(state.clone(), csrf_guard))
        .layer(from_fn_with_state(state.clone(), request_timeout))
        .layer(cors_layer(&state.config))
        .layer(from_fn_with_state(state.clone(), audit_log))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(state.clone(), error_detail))
        .layer(from_fn_with_state(state.clone(), security_headers))
        .with_state(state)
}
