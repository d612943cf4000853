//! In-memory store backed by sharded concurrent maps.
//!
//! Atomicity notes: per-identity mutations run under the identity's shard
//! write guard (`DashMap::get_mut`), so read-verify-then-remove sequences
//! like backup-code consumption cannot double-accept. Email uniqueness is
//! enforced through the normalized-email index using the entry API, so two
//! concurrent inserts of the same address cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::models::{normalize_email, AuditAction, AuditEntry, Identity, UserView};

use super::{AuditStore, CredentialStore, StoreError};

#[derive(Default)]
pub struct InMemoryStore {
    users: DashMap<Uuid, Identity>,
    /// normalized email -> identity id
    email_index: DashMap<String, Uuid>,
    audit: RwLock<Vec<AuditEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(identity: &mut Identity) {
        identity.updated_at = Utc::now();
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn insert(&self, mut identity: Identity) -> Result<UserView, StoreError> {
        identity.email = normalize_email(&identity.email);
        match self.email_index.entry(identity.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateEmail),
            Entry::Vacant(slot) => {
                let view = identity.view();
                self.users.insert(identity.id, identity);
                slot.insert(view.id);
                Ok(view)
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserView>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.view()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserView>, StoreError> {
        let normalized = normalize_email(email);
        let Some(id) = self.email_index.get(&normalized).map(|e| *e) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.view()))
    }

    async fn find_by_id_with_secrets(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email_with_secrets(
        &self,
        email: &str,
    ) -> Result<Option<Identity>, StoreError> {
        let normalized = normalize_email(email);
        let Some(id) = self.email_index.get(&normalized).map(|e| *e) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn set_email_confirm_ticket(
        &self,
        id: Uuid,
        digest: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.email_confirm_digest = Some(digest);
        user.email_confirm_expires_at = Some(expires_at);
        Self::touch(&mut user);
        Ok(())
    }

    async fn consume_email_confirm_ticket(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserView>, StoreError> {
        // Locate a candidate first, then re-check under the write guard so
        // two concurrent consumers of the same token cannot both succeed.
        let candidate = self
            .users
            .iter()
            .find(|u| u.email_confirm_digest.as_deref() == Some(digest))
            .map(|u| u.id);

        let Some(id) = candidate else {
            return Ok(None);
        };

        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        let live = user.email_confirm_digest.as_deref() == Some(digest)
            && user.email_confirm_expires_at.is_some_and(|exp| exp > now);
        if !live {
            return Ok(None);
        }

        user.email_confirm_digest = None;
        user.email_confirm_expires_at = None;
        user.is_email_confirmed = true;
        user.is_verified = true;
        Self::touch(&mut user);
        Ok(Some(user.view()))
    }

    async fn set_reset_ticket(
        &self,
        id: Uuid,
        digest: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.reset_otp_digest = Some(digest);
        user.reset_otp_expires_at = Some(expires_at);
        Self::touch(&mut user);
        Ok(())
    }

    async fn consume_reset_ticket(
        &self,
        email: &str,
        digest: &str,
        now: DateTime<Utc>,
        new_password_hash: String,
    ) -> Result<Option<UserView>, StoreError> {
        let normalized = normalize_email(email);
        let Some(id) = self.email_index.get(&normalized).map(|e| *e) else {
            return Ok(None);
        };
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        let live = user.reset_otp_digest.as_deref() == Some(digest)
            && user.reset_otp_expires_at.is_some_and(|exp| exp > now);
        if !live {
            return Ok(None);
        }

        user.reset_otp_digest = None;
        user.reset_otp_expires_at = None;
        user.password_hash = new_password_hash;
        Self::touch(&mut user);
        Ok(Some(user.view()))
    }

    async fn set_password_hash(&self, id: Uuid, hash: String) -> Result<(), StoreError> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = hash;
        Self::touch(&mut user);
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<UserView, StoreError> {
        // Claim the new email in the index before touching the record, so a
        // concurrent registration or profile change cannot take it too.
        let mut claimed: Option<String> = None;
        if let Some(new_email) = &email {
            let normalized = normalize_email(new_email);
            match self.email_index.entry(normalized.clone()) {
                Entry::Occupied(existing) if *existing.get() != id => {
                    return Err(StoreError::DuplicateEmail);
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(id);
                    claimed = Some(normalized);
                }
            }
        }

        // The users guard is dropped before touching the index again so the
        // two maps are never locked by one caller at the same time.
        let (view, released_email) = {
            let Some(mut user) = self.users.get_mut(&id) else {
                if let Some(normalized) = claimed {
                    self.email_index.remove(&normalized);
                }
                return Err(StoreError::NotFound);
            };

            if let Some(new_name) = name {
                user.name = new_name;
            }
            let mut released = None;
            if let Some(new_email) = email {
                let normalized = normalize_email(&new_email);
                if normalized != user.email {
                    released = Some(std::mem::replace(&mut user.email, normalized));
                    user.is_email_confirmed = false;
                }
            }
            Self::touch(&mut user);
            (user.view(), released)
        };

        if let Some(old) = released_email {
            self.email_index.remove(&old);
        }
        Ok(view)
    }

    async fn set_pending_two_factor_secret(
        &self,
        id: Uuid,
        secret: String,
    ) -> Result<(), StoreError> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.two_factor.secret = Some(secret);
        user.two_factor.verified = false;
        Self::touch(&mut user);
        Ok(())
    }

    async fn enable_two_factor(
        &self,
        id: Uuid,
        backup_code_hashes: Vec<String>,
    ) -> Result<(), StoreError> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.two_factor.enabled = true;
        user.two_factor.verified = true;
        user.two_factor.backup_codes = backup_code_hashes;
        Self::touch(&mut user);
        Ok(())
    }

    async fn disable_two_factor(&self, id: Uuid) -> Result<(), StoreError> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.two_factor = Default::default();
        Self::touch(&mut user);
        Ok(())
    }

    async fn remove_backup_code(&self, id: Uuid, code_hash: &str) -> Result<bool, StoreError> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        let before = user.two_factor.backup_codes.len();
        user.two_factor.backup_codes.retain(|h| h != code_hash);
        let removed = user.two_factor.backup_codes.len() < before;
        if removed {
            Self::touch(&mut user);
        }
        Ok(removed)
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.audit
            .write()
            .expect("audit log lock poisoned")
            .push(entry);
        Ok(())
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let log = self.audit.read().expect("audit log lock poisoned");
        Ok(log
            .iter()
            .rev()
            .filter(|e| e.user_id == Some(user_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_action(
        &self,
        action: AuditAction,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let log = self.audit.read().expect("audit log lock poisoned");
        Ok(log
            .iter()
            .rev()
            .filter(|e| e.action == action)
            .take(limit)
            .cloned()
            .collect())
    }
}
