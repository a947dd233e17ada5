//! Postgres implementation of the auth stores.
//!
//! Every statement uses positional bind parameters. Refresh rotation runs the
//! conditional revoke and the replacement insert in a single transaction; the
//! `revoked = FALSE` predicate guarantees that two concurrent rotations of the
//! same token cannot both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AuditStore, RefreshTokenStore, StoreError, StoreResult, UserStore};
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::auth::{NewRefreshToken, NewUser, RefreshTokenRecord, UserRecord};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

type UserRow = (i64, String, String, Option<String>, String, String, bool);

fn user_from_row(row: UserRow) -> UserRecord {
    let (id, cpf, name, email, password_hash, role, active) = row;
    UserRecord {
        id,
        cpf,
        name,
        email,
        password_hash,
        role,
        active,
    }
}

const USER_COLUMNS: &str = "id, cpf, name, email, password_hash, role, active";

type RefreshRow = (
    Uuid,
    String,
    i64,
    DateTime<Utc>,
    String,
    Option<String>,
    bool,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);

fn refresh_from_row(row: RefreshRow) -> RefreshTokenRecord {
    let (id, token_hash, owner_id, expires_at, ip_address, user_agent, revoked, revoked_at, created_at) =
        row;
    RefreshTokenRecord {
        id,
        token_hash,
        owner_id,
        expires_at,
        ip_address,
        user_agent,
        revoked,
        revoked_at,
        created_at,
    }
}

const REFRESH_COLUMNS: &str =
    "id, token_hash, user_id, expires_at, ip_address, user_agent, revoked, revoked_at, created_at";

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_cpf(&self, cpf: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE cpf = $1"
        ))
        .bind(cpf)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn create(&self, user: NewUser) -> StoreResult<UserRecord> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (cpf, name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.cpf)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("CPF already registered".into())
            } else {
                StoreError::Db(e)
            }
        })?;
        Ok(user_from_row(row))
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn insert(&self, token: NewRefreshToken) -> StoreResult<RefreshTokenRecord> {
        let row = sqlx::query_as::<_, RefreshRow>(&format!(
            "INSERT INTO refresh_tokens (id, token_hash, user_id, expires_at, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {REFRESH_COLUMNS}"
        ))
        .bind(token.id)
        .bind(&token.token_hash)
        .bind(token.owner_id)
        .bind(token.expires_at)
        .bind(&token.ip_address)
        .bind(&token.user_agent)
        .fetch_one(&self.pool)
        .await?;
        Ok(refresh_from_row(row))
    }

    async fn find_by_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let row = sqlx::query_as::<_, RefreshRow>(&format!(
            "SELECT {REFRESH_COLUMNS} FROM refresh_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(refresh_from_row))
    }

    async fn rotate(&self, old_id: Uuid, replacement: NewRefreshToken) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE, revoked_at = now() \
             WHERE id = $1 AND revoked = FALSE",
        )
        .bind(old_id)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO refresh_tokens (id, token_hash, user_id, expires_at, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(replacement.id)
        .bind(&replacement.token_hash)
        .bind(replacement.owner_id)
        .bind(replacement.expires_at)
        .bind(&replacement.ip_address)
        .bind(&replacement.user_agent)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_by_hash(&self, token_hash: &str) -> StoreResult<Option<i64>> {
        let owner = sqlx::query_scalar::<_, i64>(
            "UPDATE refresh_tokens SET revoked = TRUE, revoked_at = now() \
             WHERE token_hash = $1 AND revoked = FALSE \
             RETURNING user_id",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner)
    }

    async fn revoke_all_for_owner(&self, owner_id: i64) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE, revoked_at = now() \
             WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

type AuditRow = (
    Uuid,
    Option<i64>,
    String,
    String,
    Option<String>,
    Option<serde_json::Value>,
    String,
    Option<String>,
    DateTime<Utc>,
);

#[async_trait]
impl AuditStore for PgStore {
    async fn insert(&self, entry: &AuditEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, user_id, action, resource, resource_id, details, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(&entry.resource)
        .bind(&entry.resource_id)
        .bind(&entry.details)
        .bind(&entry.source_ip)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT id, user_id, action, resource, resource_id, details, ip_address, user_agent, created_at \
             FROM audit_logs \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, actor_id, action, resource, resource_id, details, source_ip, user_agent, created_at)| {
                    let action = action
                        .parse::<AuditAction>()
                        .map_err(StoreError::Corrupt)?;
                    Ok(AuditEntry {
                        id,
                        actor_id,
                        action,
                        resource,
                        resource_id,
                        details,
                        source_ip,
                        user_agent,
                        created_at,
                    })
                },
            )
            .collect()
    }
}
