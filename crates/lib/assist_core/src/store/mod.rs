//! Persistence seams consumed by the auth layer.
//!
//! Each concern is a trait so the services never see SQL. Two backends exist:
//! [`postgres::PgStore`] for deployments and [`memory::MemoryStore`] for
//! tests and single-process development.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::audit::AuditEntry;
use crate::models::auth::{NewRefreshToken, NewUser, RefreshTokenRecord, UserRecord};
use crate::rate_limit::store::{CounterStore, InMemoryCounterStore};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Credential lookups. The auth layer never writes users outside provisioning.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by the bare 11-digit CPF.
    async fn find_by_cpf(&self, cpf: &str) -> StoreResult<Option<UserRecord>>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>>;

    /// Create a user. Fails with [`StoreError::Conflict`] on a duplicate CPF.
    async fn create(&self, user: NewUser) -> StoreResult<UserRecord>;
}

/// Refresh token persistence. Rows are never deleted, only revoked.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: NewRefreshToken) -> StoreResult<RefreshTokenRecord>;

    async fn find_by_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Revoke `old_id` only if it is still live and store `replacement`, as one
    /// atomic step. Returns `false` when the old token was already revoked.
    async fn rotate(&self, old_id: Uuid, replacement: NewRefreshToken) -> StoreResult<bool>;

    /// Revoke a live token. Returns its owner when a row flipped.
    async fn revoke_by_hash(&self, token_hash: &str) -> StoreResult<Option<i64>>;

    /// Revoke every live token of an owner. Returns the number revoked.
    async fn revoke_all_for_owner(&self, owner_id: i64) -> StoreResult<u64>;
}

/// Append-only audit log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert(&self, entry: &AuditEntry) -> StoreResult<()>;

    /// Most recent entries first.
    async fn recent(&self, limit: i64) -> StoreResult<Vec<AuditEntry>>;
}

/// The set of stores a running service needs.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub audit: Arc<dyn AuditStore>,
    pub counters: Arc<dyn CounterStore>,
}

impl Stores {
    /// Postgres-backed stores with in-process rate-limit counters.
    pub fn postgres(pool: PgPool) -> Self {
        let pg = Arc::new(postgres::PgStore::new(pool));
        Self {
            users: pg.clone(),
            refresh_tokens: pg.clone(),
            audit: pg,
            counters: Arc::new(InMemoryCounterStore::new()),
        }
    }

    /// Fully in-memory stores. State is lost on restart.
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(memory::MemoryStore::new()))
    }

    /// In-memory stores sharing an existing [`memory::MemoryStore`], so callers
    /// can seed users or inspect state afterwards.
    pub fn from_memory(store: Arc<memory::MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            refresh_tokens: store.clone(),
            audit: store,
            counters: Arc::new(InMemoryCounterStore::new()),
        }
    }
}
