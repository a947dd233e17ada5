//! Audit logger over an [`AuditStore`].
//!
//! Writes are fire-and-forget: [`AuditLogger::record`] spawns the insert on the
//! runtime and returns immediately. Failures are logged, never surfaced to the
//! request that caused them.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::models::audit::AuditEntry;
use crate::store::{AuditStore, StoreResult};

/// Maximum page size for [`AuditLogger::recent`].
pub const MAX_RECENT: i64 = 500;

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Persist `entry` in the background. The handle is only useful to tests.
    pub fn record(&self, entry: AuditEntry) -> JoinHandle<()> {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.insert(&entry).await {
                warn!(
                    action = %entry.action,
                    resource = %entry.resource,
                    error = %e,
                    "failed to record audit entry"
                );
            }
        })
    }

    /// Most recent entries first, `limit` clamped to `1..=MAX_RECENT`.
    pub async fn recent(&self, limit: i64) -> StoreResult<Vec<AuditEntry>> {
        self.store.recent(limit.clamp(1, MAX_RECENT)).await
    }
}
