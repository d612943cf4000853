//! Storage contracts for identities and the audit trail.
//!
//! The service layer only ever talks to these traits. The bundled
//! implementation is the in-memory [`memory::InMemoryStore`]; a persistent
//! backend slots in behind the same contracts. Everything that must be
//! atomic under concurrency (unique-email insert, ticket consumption,
//! backup-code removal) is atomic at this layer, not re-derived above it.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AuditAction, AuditEntry, Identity, UserView};

pub use memory::InMemoryStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("record not found")]
    NotFound,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new identity. Email uniqueness (case-insensitive) is
    /// enforced atomically; the second of two concurrent writers gets
    /// [`StoreError::DuplicateEmail`].
    async fn insert(&self, identity: Identity) -> Result<UserView, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserView>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserView>, StoreError>;

    /// Opt-in projection including password hash and second-factor material.
    async fn find_by_id_with_secrets(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    /// Opt-in projection including password hash and second-factor material.
    async fn find_by_email_with_secrets(&self, email: &str)
        -> Result<Option<Identity>, StoreError>;

    /// Attach a fresh email-confirmation ticket, replacing any live one.
    async fn set_email_confirm_ticket(
        &self,
        id: Uuid,
        digest: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Consume the live, unexpired confirmation ticket matching `digest`:
    /// clears the ticket and marks the identity confirmed and verified in
    /// one step, so a second consume of the same token finds nothing.
    /// Returns `None` when no identity holds a matching unexpired ticket.
    async fn consume_email_confirm_ticket(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserView>, StoreError>;

    /// Attach a fresh password-reset ticket, replacing any live one.
    async fn set_reset_ticket(
        &self,
        id: Uuid,
        digest: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Consume the reset ticket and install the new password hash in one
    /// step. `None` when email + digest + expiry do not jointly match.
    async fn consume_reset_ticket(
        &self,
        email: &str,
        digest: &str,
        now: DateTime<Utc>,
        new_password_hash: String,
    ) -> Result<Option<UserView>, StoreError>;

    async fn set_password_hash(&self, id: Uuid, hash: String) -> Result<(), StoreError>;

    /// Apply a name and/or email change. An email change enforces
    /// uniqueness against other identities and clears the confirmed flag.
    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<UserView, StoreError>;

    /// Stage a generated (not yet enabled) second-factor secret.
    async fn set_pending_two_factor_secret(
        &self,
        id: Uuid,
        secret: String,
    ) -> Result<(), StoreError>;

    /// Flip the staged secret to enabled+verified and store the hashed
    /// backup codes.
    async fn enable_two_factor(
        &self,
        id: Uuid,
        backup_code_hashes: Vec<String>,
    ) -> Result<(), StoreError>;

    /// Clear secret, backup codes, and both flags.
    async fn disable_two_factor(&self, id: Uuid) -> Result<(), StoreError>;

    /// Remove one backup-code hash if still present. Returns `false` when a
    /// concurrent request consumed it first; the caller must then treat the
    /// code as spent.
    async fn remove_backup_code(&self, id: Uuid, code_hash: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError>;

    /// Entries for one actor, newest first.
    async fn find_by_user(&self, user_id: Uuid, limit: usize)
        -> Result<Vec<AuditEntry>, StoreError>;

    /// Entries for one action kind, newest first.
    async fn find_by_action(
        &self,
        action: AuditAction,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError>;
}
