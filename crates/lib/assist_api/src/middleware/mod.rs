//! Middleware stack. Outer to inner: security headers, error detail, panic
//! recovery, audit, CORS, timeout, CSRF guard, general rate limit, input
//! sanitizing; then per-route rate limits, authentication and authorization.
//! Preflights answered by CORS still pass through audit.

pub mod audit;
pub mod auth;
pub mod client;
pub mod errors;
pub mod rate_limit;
pub mod sanitize;
pub mod security;
pub mod timeout;
