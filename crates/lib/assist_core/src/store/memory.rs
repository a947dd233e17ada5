//! In-memory implementation of the auth stores.
//!
//! Used by tests and by single-process development setups. Nothing is
//! durable. Every mutation happens under one write lock per map, which gives
//! the same single-use guarantee for refresh rotation as the conditional
//! update in Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{AuditStore, RefreshTokenStore, StoreError, StoreResult, UserStore};
use crate::models::audit::AuditEntry;
use crate::models::auth::{NewRefreshToken, NewUser, RefreshTokenRecord, UserRecord};

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<i64, UserRecord>>,
    next_user_id: AtomicI64,
    refresh_tokens: Mutex<HashMap<Uuid, RefreshTokenRecord>>,
    audit: RwLock<Vec<AuditEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_user_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Snapshot of every refresh token record, for inspection in tests.
    pub async fn refresh_tokens(&self) -> Vec<RefreshTokenRecord> {
        self.refresh_tokens.lock().await.values().cloned().collect()
    }

    /// Flip a user's `active` flag. Returns `false` if the user does not exist.
    pub async fn set_active(&self, id: i64, active: bool) -> bool {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.active = active;
                true
            }
            None => false,
        }
    }

    /// Insert a raw user row, bypassing role validation.
    pub async fn insert_raw_user(&self, mut record: UserRecord) -> UserRecord {
        record.id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        self.users.write().await.insert(record.id, record.clone());
        record
    }
}

fn record_from(token: NewRefreshToken) -> RefreshTokenRecord {
    RefreshTokenRecord {
        id: token.id,
        token_hash: token.token_hash,
        owner_id: token.owner_id,
        expires_at: token.expires_at,
        ip_address: token.ip_address,
        user_agent: token.user_agent,
        revoked: false,
        revoked_at: None,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_cpf(&self, cpf: &str) -> StoreResult<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.cpf == cpf).cloned())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.cpf == user.cpf) {
            return Err(StoreError::Conflict("CPF already registered".into()));
        }
        let record = UserRecord {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst),
            cpf: user.cpf,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role.as_str().to_string(),
            active: true,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert(&self, token: NewRefreshToken) -> StoreResult<RefreshTokenRecord> {
        let mut tokens = self.refresh_tokens.lock().await;
        if tokens.values().any(|t| t.token_hash == token.token_hash) {
            return Err(StoreError::Conflict("duplicate refresh token".into()));
        }
        let record = record_from(token);
        tokens.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let tokens = self.refresh_tokens.lock().await;
        Ok(tokens.values().find(|t| t.token_hash == token_hash).cloned())
    }

    async fn rotate(&self, old_id: Uuid, replacement: NewRefreshToken) -> StoreResult<bool> {
        let mut tokens = self.refresh_tokens.lock().await;
        match tokens.get_mut(&old_id) {
            Some(old) if !old.revoked => {
                old.revoked = true;
                old.revoked_at = Some(Utc::now());
            }
            _ => return Ok(false),
        }
        let record = record_from(replacement);
        tokens.insert(record.id, record);
        Ok(true)
    }

    async fn revoke_by_hash(&self, token_hash: &str) -> StoreResult<Option<i64>> {
        let mut tokens = self.refresh_tokens.lock().await;
        let live = tokens
            .values_mut()
            .find(|t| t.token_hash == token_hash && !t.revoked);
        Ok(live.map(|t| {
            t.revoked = true;
            t.revoked_at = Some(Utc::now());
            t.owner_id
        }))
    }

    async fn revoke_all_for_owner(&self, owner_id: i64) -> StoreResult<u64> {
        let mut tokens = self.refresh_tokens.lock().await;
        let now = Utc::now();
        let mut count = 0;
        for token in tokens
            .values_mut()
            .filter(|t| t.owner_id == owner_id && !t.revoked)
        {
            token.revoked = true;
            token.revoked_at = Some(now);
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn insert(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.audit.write().await.push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<AuditEntry>> {
        let entries = self.audit.read().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}
