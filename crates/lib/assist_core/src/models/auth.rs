//! Authentication domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Staff and citizen roles. The set is closed: anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Municipal secretary (administrator).
    Secretary,
    /// Public servant / caseworker.
    Server,
    /// CRAS/CREAS coordinator.
    Coordinator,
    /// Citizen receiving benefits.
    Beneficiary,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Secretary,
        Role::Server,
        Role::Coordinator,
        Role::Beneficiary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Secretary => "secretary",
            Role::Server => "server",
            Role::Coordinator => "coordinator",
            Role::Beneficiary => "beneficiary",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role name outside the closed set.
#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Verified identity attached to a request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: i64,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user id, as a decimal string.
    pub sub: String,
    pub role: Role,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Network identity of the caller, recorded with refresh tokens and audit entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    pub fn new(ip: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent,
        }
    }

    /// Placeholder when the peer address is not available (e.g. in-process calls).
    pub fn unknown() -> Self {
        Self::new("unknown", None)
    }
}

/// User row as stored, role still in its textual form.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub cpf: String,
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub active: bool,
}

/// User with a recognised role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub cpf: String,
    pub name: String,
    pub role: Role,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub cpf: String,
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

/// Refresh token record stored in the database. Only the SHA-256 digest of the
/// token value is kept.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub token_hash: String,
    pub owner_id: i64,
    pub expires_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for storing a refresh token.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub token_hash: String,
    pub owner_id: i64,
    pub expires_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: Option<String>,
}
