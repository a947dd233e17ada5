//! Opaque refresh token values.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};

/// Length of a refresh token in characters.
pub const REFRESH_TOKEN_LEN: usize = 64;

/// Generate a cryptographically random refresh token (64 alphanumeric chars).
pub fn generate_refresh_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest of a refresh token. Only this form is stored.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
