//! Database migrations.
//!
//! Embeds the SQL files under `assist_core/migrations/` (users, refresh
//! tokens, audit log).

use sqlx::PgPool;

/// Run all embedded migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
