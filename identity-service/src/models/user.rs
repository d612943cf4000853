//! Identity model and its projections.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Second-factor enrollment state embedded in an identity.
///
/// `verified` distinguishes "secret generated" (setup initiated) from
/// "secret confirmed and active". Backup-code hashes are removed from the
/// set as they are consumed.
#[derive(Debug, Clone, Default)]
pub struct TwoFactorProfile {
    pub enabled: bool,
    pub verified: bool,
    /// Base32 shared secret. Present from setup initiation until disable;
    /// exposed to the client only once, at setup time.
    pub secret: Option<String>,
    /// Argon2 hashes of the unused backup codes.
    pub backup_codes: Vec<String>,
}

/// Full identity record, secret material included.
///
/// Only the credential store hands these out, and only through the explicit
/// `*_with_secrets` lookups. Everything else works with [`UserView`].
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    /// Normalized (trimmed, lowercased) and unique case-insensitively.
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub is_email_confirmed: bool,
    /// SHA-256 digest of the live email-confirmation token, if any.
    pub email_confirm_digest: Option<String>,
    pub email_confirm_expires_at: Option<DateTime<Utc>>,
    /// SHA-256 digest of the live password-reset code, if any.
    pub reset_otp_digest: Option<String>,
    pub reset_otp_expires_at: Option<DateTime<Utc>>,
    pub two_factor: TwoFactorProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(email: String, name: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            password_hash,
            is_verified: false,
            is_email_confirmed: false,
            email_confirm_digest: None,
            email_confirm_expires_at: None,
            reset_otp_digest: None,
            reset_otp_expires_at: None,
            two_factor: TwoFactorProfile::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Default projection without credential material.
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            is_verified: self.is_verified,
            is_email_confirmed: self.is_email_confirmed,
            two_factor_enabled: self.two_factor.enabled,
            created_at: self.created_at,
        }
    }
}

/// What default query paths and API responses see: no password hash, no
/// token digests, no second-factor material.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_verified: bool,
    pub is_email_confirmed: bool,
    pub two_factor_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Canonical form used for storage and uniqueness checks.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn view_excludes_secret_material() {
        let mut identity = Identity::new(
            "alice@example.com".into(),
            "Alice".into(),
            "$argon2id$fake".into(),
        );
        identity.two_factor.secret = Some("SECRET".into());
        identity.two_factor.enabled = true;

        let view = identity.view();
        assert_eq!(view.email, "alice@example.com");
        assert!(view.two_factor_enabled);
        // The projection carries flags only; the serialized form has no
        // hash/digest/secret fields at all.
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("secret").is_none());
    }
}
