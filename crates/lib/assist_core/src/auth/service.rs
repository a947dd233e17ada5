//! Token service: access-token issuance and verification, refresh-token
//! lifecycle, and credential login.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, error, info, warn};

use super::AuthError;
use super::jwt::TokenSigner;
use super::password::{hash_password_with_cost, verify_password};
use super::refresh::{generate_refresh_token, hash_refresh_token};
use crate::cpf;
use crate::models::auth::{ClientMeta, NewRefreshToken, Principal, Role, TokenClaims, User};
use crate::store::{RefreshTokenStore, UserStore};
use crate::uuid::uuidv7;

/// Lifetimes and hashing cost.
#[derive(Debug, Clone, Copy)]
pub struct TokenSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::hours(8),
            refresh_ttl: Duration::days(7),
            bcrypt_cost: super::password::BCRYPT_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub principal: Principal,
}

#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedAccessToken,
    pub refresh: IssuedRefreshToken,
}

/// Successful credential login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

pub struct TokenService {
    signer: TokenSigner,
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    settings: TokenSettings,
    dummy_hash: OnceLock<String>,
}

impl TokenService {
    pub fn new(
        secret: &[u8],
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        settings: TokenSettings,
    ) -> Self {
        Self {
            signer: TokenSigner::new(secret),
            users,
            refresh_tokens,
            settings,
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Issue an access token valid from now.
    pub fn issue_access_token(
        &self,
        subject_id: i64,
        role: Role,
    ) -> Result<IssuedAccessToken, AuthError> {
        self.issue_access_token_at(subject_id, role, Utc::now())
    }

    /// Issue an access token as of `issued_at`. Timestamps are kept at whole
    /// seconds, matching what the token carries.
    pub fn issue_access_token_at(
        &self,
        subject_id: i64,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, AuthError> {
        let iat = issued_at.timestamp();
        let exp = iat + self.settings.access_ttl.num_seconds();
        let claims = TokenClaims {
            sub: subject_id.to_string(),
            role,
            iat,
            exp,
        };
        let token = self.signer.sign(&claims)?;
        Ok(IssuedAccessToken {
            token,
            principal: principal_from_claims(subject_id, &claims)?,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.signer.verify(token)?;
        let subject_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::TokenInvalid)?;
        principal_from_claims(subject_id, &claims)
    }

    pub async fn issue_refresh_token(
        &self,
        owner_id: i64,
        client: &ClientMeta,
    ) -> Result<IssuedRefreshToken, AuthError> {
        let (token, record) = self.new_refresh_record(owner_id, client)?;
        let expires_at = record.expires_at;
        self.refresh_tokens.insert(record).await?;
        Ok(IssuedRefreshToken { token, expires_at })
    }

    /// Exchange a live refresh token for a new pair. The old token is revoked
    /// in the same step; of two concurrent rotations only one succeeds.
    pub async fn rotate_refresh_token(
        &self,
        old_token: &str,
        client: &ClientMeta,
    ) -> Result<TokenPair, AuthError> {
        let record = self
            .refresh_tokens
            .find_by_hash(&hash_refresh_token(old_token))
            .await?
            .ok_or(AuthError::TokenNotFound)?;
        if record.revoked {
            warn!(token_id = %record.id, owner_id = record.owner_id, "revoked refresh token presented");
            return Err(AuthError::TokenRevoked);
        }
        if Utc::now() > record.expires_at {
            return Err(AuthError::TokenExpired);
        }

        let user = self
            .users
            .find_by_id(record.owner_id)
            .await?
            .filter(|u| u.active)
            .ok_or(AuthError::TokenRevoked)?;
        let role = user
            .role
            .parse::<Role>()
            .map_err(|_| AuthError::TokenRevoked)?;

        let (token, replacement) = self.new_refresh_record(user.id, client)?;
        let expires_at = replacement.expires_at;
        if !self.refresh_tokens.rotate(record.id, replacement).await? {
            warn!(token_id = %record.id, "refresh token lost a concurrent rotation");
            return Err(AuthError::TokenRevoked);
        }
        debug!(owner_id = user.id, "refresh token rotated");

        Ok(TokenPair {
            access: self.issue_access_token(user.id, role)?,
            refresh: IssuedRefreshToken { token, expires_at },
        })
    }

    /// Revoke a refresh token. Unknown or already revoked tokens are not an
    /// error. Returns the owner when a live token was revoked.
    pub async fn revoke_refresh_token(&self, token: &str) -> Result<Option<i64>, AuthError> {
        Ok(self
            .refresh_tokens
            .revoke_by_hash(&hash_refresh_token(token))
            .await?)
    }

    /// Revoke every live refresh token of `owner_id`.
    pub async fn revoke_all_for_owner(&self, owner_id: i64) -> Result<u64, AuthError> {
        let revoked = self.refresh_tokens.revoke_all_for_owner(owner_id).await?;
        info!(owner_id, revoked, "revoked all sessions");
        Ok(revoked)
    }

    /// Check a CPF/password pair and issue a token pair. Unknown CPF, wrong
    /// password, inactive account and unrecognised role are indistinguishable
    /// to the caller.
    pub async fn authenticate(
        &self,
        cpf_input: &str,
        password: &str,
        client: &ClientMeta,
    ) -> Result<LoginOutcome, AuthError> {
        let digits = cpf::normalize(cpf_input)
            .ok_or_else(|| AuthError::ValidationError("CPF inválido".into()))?;

        let Some(record) = self.users.find_by_cpf(&digits).await? else {
            verify_password(password, self.dummy_hash()?)?;
            debug!(cpf = %cpf::mask(&digits), "login for unknown CPF");
            return Err(AuthError::InvalidCredentials);
        };

        let matches = verify_password(password, &record.password_hash).unwrap_or_else(|e| {
            error!(user_id = record.id, error = %e, "stored password hash is unusable");
            false
        });
        if !matches {
            debug!(cpf = %cpf::mask(&digits), "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        if !record.active {
            debug!(user_id = record.id, "login for inactive user");
            return Err(AuthError::InvalidCredentials);
        }
        let role = record.role.parse::<Role>().map_err(|e| {
            warn!(user_id = record.id, error = %e, "user row carries an unknown role");
            AuthError::InvalidCredentials
        })?;

        let access = self.issue_access_token(record.id, role)?;
        let refresh = self.issue_refresh_token(record.id, client).await?;
        info!(user_id = record.id, role = %role, "user logged in");

        Ok(LoginOutcome {
            user: User {
                id: record.id,
                cpf: record.cpf,
                name: record.name,
                role,
            },
            tokens: TokenPair { access, refresh },
        })
    }

    fn new_refresh_record(
        &self,
        owner_id: i64,
        client: &ClientMeta,
    ) -> Result<(String, NewRefreshToken), AuthError> {
        let expires_at = Utc::now()
            .checked_add_signed(self.settings.refresh_ttl)
            .ok_or_else(|| AuthError::Internal("refresh token lifetime out of range".into()))?;
        let token = generate_refresh_token();
        let record = NewRefreshToken {
            id: uuidv7(),
            token_hash: hash_refresh_token(&token),
            owner_id,
            expires_at,
            ip_address: client.ip.clone(),
            user_agent: client.user_agent.clone(),
        };
        Ok((token, record))
    }

    fn dummy_hash(&self) -> Result<&str, AuthError> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash.as_str());
        }
        let hash = hash_password_with_cost("assist-dummy-password", self.settings.bcrypt_cost)?;
        Ok(self.dummy_hash.get_or_init(|| hash).as_str())
    }
}

fn principal_from_claims(subject_id: i64, claims: &TokenClaims) -> Result<Principal, AuthError> {
    let issued_at = Utc
        .timestamp_opt(claims.iat, 0)
        .single()
        .ok_or(AuthError::TokenInvalid)?;
    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .ok_or(AuthError::TokenInvalid)?;
    Ok(Principal {
        subject_id,
        role: claims.role,
        issued_at,
        expires_at,
    })
}
