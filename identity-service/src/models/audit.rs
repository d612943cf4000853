//! Append-only audit trail entries for security-relevant events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of auditable actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "REGISTER")]
    Register,
    #[serde(rename = "LOGIN_ATTEMPT")]
    LoginAttempt,
    #[serde(rename = "LOGIN_SUCCESS")]
    LoginSuccess,
    #[serde(rename = "LOGIN_FAILURE")]
    LoginFailure,
    #[serde(rename = "EMAIL_CONFIRMATION_SENT")]
    EmailConfirmationSent,
    #[serde(rename = "EMAIL_CONFIRMED")]
    EmailConfirmed,
    #[serde(rename = "LOGOUT")]
    Logout,
    #[serde(rename = "PASSWORD_RESET_REQUEST")]
    PasswordResetRequest,
    #[serde(rename = "PASSWORD_RESET_SUCCESS")]
    PasswordResetSuccess,
    #[serde(rename = "2FA_SETUP_INITIATED")]
    TwoFactorSetupInitiated,
    #[serde(rename = "2FA_ENABLED")]
    TwoFactorEnabled,
    #[serde(rename = "2FA_DISABLED")]
    TwoFactorDisabled,
    #[serde(rename = "2FA_VERIFIED")]
    TwoFactorVerified,
    #[serde(rename = "BACKUP_CODE_USED")]
    BackupCodeUsed,
    #[serde(rename = "PROFILE_UPDATE")]
    ProfileUpdate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Register => "REGISTER",
            AuditAction::LoginAttempt => "LOGIN_ATTEMPT",
            AuditAction::LoginSuccess => "LOGIN_SUCCESS",
            AuditAction::LoginFailure => "LOGIN_FAILURE",
            AuditAction::EmailConfirmationSent => "EMAIL_CONFIRMATION_SENT",
            AuditAction::EmailConfirmed => "EMAIL_CONFIRMED",
            AuditAction::Logout => "LOGOUT",
            AuditAction::PasswordResetRequest => "PASSWORD_RESET_REQUEST",
            AuditAction::PasswordResetSuccess => "PASSWORD_RESET_SUCCESS",
            AuditAction::TwoFactorSetupInitiated => "2FA_SETUP_INITIATED",
            AuditAction::TwoFactorEnabled => "2FA_ENABLED",
            AuditAction::TwoFactorDisabled => "2FA_DISABLED",
            AuditAction::TwoFactorVerified => "2FA_VERIFIED",
            AuditAction::BackupCodeUsed => "BACKUP_CODE_USED",
            AuditAction::ProfileUpdate => "PROFILE_UPDATE",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request came from: network address plus client identifier.
#[derive(Debug, Clone, Default)]
pub struct RequestOrigin {
    pub ip: String,
    pub user_agent: Option<String>,
}

/// Immutable audit record. `user_id` is a weak back-reference for lookup
/// only; pre-authentication events carry no actor at all.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub email: Option<String>,
    pub ip: String,
    pub user_agent: Option<String>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, origin: &RequestOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            action,
            email: None,
            ip: origin.ip.clone(),
            user_agent: origin.user_agent.clone(),
            metadata: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
