//! Append-only recording of security-relevant events.

use std::sync::Arc;
use uuid::Uuid;

use crate::db::{AuditStore, StoreError};
use crate::models::{AuditAction, AuditEntry};

/// Records entries without ever failing the operation that produced them.
/// A failed write is downgraded to an error log so it stays observable.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = self.store.append(entry).await {
            tracing::error!(error = %e, action = %action, "Failed to write audit entry");
        }
    }

    /// Forensic query: entries for one actor, newest first.
    pub async fn entries_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        self.store.find_by_user(user_id, limit).await
    }

    /// Forensic query: entries for one action kind, newest first.
    pub async fn entries_for_action(
        &self,
        action: AuditAction,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        self.store.find_by_action(action, limit).await
    }
}
