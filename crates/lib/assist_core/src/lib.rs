//! # assist_core
//!
//! Core domain logic for Assist: the authentication and security layer of the
//! municipal social-assistance API.
//!
//! Nothing in this crate knows about HTTP. The `assist_api` crate wires these
//! pieces into axum middleware and handlers.

pub mod audit;
pub mod auth;
pub mod cpf;
pub mod migrate;
pub mod models;
pub mod rate_limit;
pub mod sanitize;
pub mod store;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
