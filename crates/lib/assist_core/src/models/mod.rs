//! Domain models shared by the core services and the HTTP layer.
//!
//! These are internal models, distinct from the camelCase wire models in
//! `assist_api::models`.

pub mod audit;
pub mod auth;
