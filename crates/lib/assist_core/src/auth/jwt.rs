//! JWT signing and verification (HS256 only).

use std::path::PathBuf;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::warn;

use super::AuthError;
use crate::models::auth::TokenClaims;

/// Minimum secret length accepted in hardened deployments.
pub const MIN_SECRET_LEN: usize = 32;

/// HS256 key pair derived from a shared secret.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature, algorithm and expiry. A token stays valid through
    /// the second named by `exp` and is expired after it.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<TokenClaims, AuthError> {
        let claims = decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })?;
        if now > claims.exp {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}

/// Random 64-character secret.
pub fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Development secret: read from the user data dir, or generated and
/// persisted there on first use. Never used in hardened mode.
pub fn resolve_dev_secret() -> String {
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret = generate_secret();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(&secret_path, &secret) {
        warn!(path = %secret_path.display(), error = %e, "could not persist JWT secret");
    }
    warn!(
        path = %secret_path.display(),
        "no JWT_SECRET set, using a generated development secret"
    );
    secret
}

/// Path to the persisted development secret.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("assist")
        .join("jwt-secret")
}
