//! Time-ordered identifiers for insert-only tables.
//!
//! Refresh tokens and audit entries are keyed by UUIDv7 so that primary-key
//! order follows creation order. User ids stay `BIGSERIAL`.

use uuid::Uuid;

/// Generate a new UUIDv7.
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
