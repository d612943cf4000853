//! The authentication state machine.
//!
//! Per principal the login lifecycle is
//! `Anonymous -> EmailUnconfirmed -> AwaitingSecondFactor -> Authenticated`,
//! with `AwaitingSecondFactor` skipped entirely when no second factor is
//! enrolled. Every attempt, success or failure, produces an audit entry.

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::TicketConfig,
    db::{CredentialStore, StoreError},
    dtos::auth::{LoginRequest, RegisterRequest},
    dtos::user::UpdateProfileRequest,
    models::{normalize_email, AuditAction, AuditEntry, Identity, RequestOrigin, UserView},
    services::{
        AuditRecorder, EmailProvider, ServiceError, Session, SessionIssuer, TotpEngine,
        TwoFactorEnrollment,
    },
    utils::{
        digest_token, generate_otp, generate_token, hash_password, validation, verify_password,
        Password, PasswordHashString,
    },
};

const RESET_OTP_DIGITS: u32 = 6;

/// Where a credential-valid login lands.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Fully authenticated; set the session cookie.
    Authenticated { token: String, user: UserView },
    /// Credentials and email confirmation passed, second factor pending;
    /// set the pending-session cookie.
    SecondFactorRequired { token: String, user: UserView },
    /// Email unconfirmed: a fresh confirmation ticket was issued and
    /// mailed. No session of any kind.
    ConfirmationEmailSent { has_two_factor: bool },
}

/// Result of consuming an email-confirmation ticket.
#[derive(Debug)]
pub enum ConfirmOutcome {
    Authenticated { token: String, user: UserView },
    SecondFactorRequired { token: String, user: UserView },
}

/// Successful second-factor verification.
#[derive(Debug)]
pub struct SecondFactorVerification {
    pub token: String,
    pub user: UserView,
    /// `"TOTP"` or `"backup_code"`, recorded in the audit trail.
    pub method: &'static str,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    audit: AuditRecorder,
    email: Arc<dyn EmailProvider>,
    sessions: SessionIssuer,
    totp: TotpEngine,
    tickets: TicketConfig,
    base_url: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        audit: AuditRecorder,
        email: Arc<dyn EmailProvider>,
        sessions: SessionIssuer,
        totp: TotpEngine,
        tickets: TicketConfig,
        base_url: String,
    ) -> Self {
        Self {
            store,
            audit,
            email,
            sessions,
            totp,
            tickets,
            base_url,
        }
    }

    /// Create an identity and issue the initial email-confirmation ticket.
    /// Registration never logs the user in.
    pub async fn register(
        &self,
        req: RegisterRequest,
        origin: &RequestOrigin,
    ) -> Result<UserView, ServiceError> {
        let name = validation::validate_display_name(&req.name).map_err(ServiceError::Validation)?;
        validation::validate_password_policy(&req.password).map_err(ServiceError::Validation)?;

        let password_hash = hash_password(&Password::new(req.password))?;
        let identity = Identity::new(req.email, name, password_hash.into_string());

        let user = self.store.insert(identity).await.map_err(|e| match e {
            StoreError::DuplicateEmail => ServiceError::DuplicateIdentity,
            other => ServiceError::Store(other),
        })?;

        tracing::info!(user_id = %user.id, "User registered");
        self.audit
            .record(
                AuditEntry::new(AuditAction::Register, origin)
                    .user(user.id)
                    .email(&user.email),
            )
            .await;

        self.issue_confirmation_ticket(
            user.id,
            &user.email,
            Duration::hours(self.tickets.registration_confirm_hours),
            origin,
        )
        .await?;

        Ok(user)
    }

    /// Password check, then branch on confirmation state and second-factor
    /// enrollment. Unknown account and wrong password are indistinguishable
    /// to the caller.
    pub async fn login(
        &self,
        req: LoginRequest,
        origin: &RequestOrigin,
    ) -> Result<LoginOutcome, ServiceError> {
        let identity = self
            .store
            .find_by_email_with_secrets(&req.email)
            .await?
            .filter(|identity| {
                verify_password(
                    &Password::new(req.password.clone()),
                    &PasswordHashString::new(identity.password_hash.clone()),
                )
                .is_ok()
            });

        let Some(identity) = identity else {
            self.audit
                .record(
                    AuditEntry::new(AuditAction::LoginFailure, origin)
                        .email(&normalize_email(&req.email))
                        .metadata(json!({ "reason": "Invalid credentials" })),
                )
                .await;
            return Err(ServiceError::InvalidCredentials);
        };

        if !identity.is_email_confirmed {
            // Confirmation gates this login attempt, so the ticket is
            // short-lived compared to the registration one.
            let has_two_factor = identity.two_factor.enabled;
            self.issue_confirmation_ticket(
                identity.id,
                &identity.email,
                Duration::minutes(self.tickets.login_confirm_minutes),
                origin,
            )
            .await?;
            return Ok(LoginOutcome::ConfirmationEmailSent { has_two_factor });
        }

        if identity.two_factor.enabled {
            let token = self.sessions.issue(Session::Pending {
                user_id: identity.id,
            })?;
            self.audit
                .record(
                    AuditEntry::new(AuditAction::LoginAttempt, origin)
                        .user(identity.id)
                        .email(&identity.email)
                        .metadata(json!({ "twoFactorRequired": true })),
                )
                .await;
            return Ok(LoginOutcome::SecondFactorRequired {
                token,
                user: identity.view(),
            });
        }

        let token = self.sessions.issue(Session::Full {
            user_id: identity.id,
        })?;
        self.audit
            .record(
                AuditEntry::new(AuditAction::LoginSuccess, origin)
                    .user(identity.id)
                    .email(&identity.email),
            )
            .await;
        Ok(LoginOutcome::Authenticated {
            token,
            user: identity.view(),
        })
    }

    /// Consume an email-confirmation ticket, then complete the login the
    /// same way a confirmed password login would.
    pub async fn confirm_email(
        &self,
        token: &str,
        origin: &RequestOrigin,
    ) -> Result<ConfirmOutcome, ServiceError> {
        let digest = digest_token(token);
        let consumed = self
            .store
            .consume_email_confirm_ticket(&digest, Utc::now())
            .await?;

        let Some(user) = consumed else {
            self.audit
                .record(
                    AuditEntry::new(AuditAction::LoginFailure, origin)
                        .metadata(json!({ "reason": "Invalid or expired confirmation token" })),
                )
                .await;
            return Err(ServiceError::InvalidOrExpiredTicket(
                "Invalid or expired confirmation link",
            ));
        };

        self.audit
            .record(
                AuditEntry::new(AuditAction::EmailConfirmed, origin)
                    .user(user.id)
                    .email(&user.email),
            )
            .await;

        if user.two_factor_enabled {
            let token = self.sessions.issue(Session::Pending { user_id: user.id })?;
            self.audit
                .record(
                    AuditEntry::new(AuditAction::LoginAttempt, origin)
                        .user(user.id)
                        .email(&user.email)
                        .metadata(json!({ "twoFactorRequired": true })),
                )
                .await;
            return Ok(ConfirmOutcome::SecondFactorRequired { token, user });
        }

        let token = self.sessions.issue(Session::Full { user_id: user.id })?;
        self.audit
            .record(
                AuditEntry::new(AuditAction::LoginSuccess, origin)
                    .user(user.id)
                    .email(&user.email),
            )
            .await;
        Ok(ConfirmOutcome::Authenticated { token, user })
    }

    /// Complete a pending login with a TOTP code or a backup code. TOTP is
    /// tried first; a consumed backup code is removed from the set before
    /// the session is upgraded.
    pub async fn verify_second_factor(
        &self,
        session: Session,
        totp_code: Option<&str>,
        backup_code: Option<&str>,
        origin: &RequestOrigin,
    ) -> Result<SecondFactorVerification, ServiceError> {
        let Session::Pending { user_id } = session else {
            return Err(ServiceError::SecondFactorNotRequired);
        };

        let identity = self
            .store
            .find_by_id_with_secrets(user_id)
            .await?
            .ok_or(ServiceError::Store(StoreError::NotFound))?;

        if !identity.two_factor.enabled {
            return Err(ServiceError::SecondFactorNotRequired);
        }

        let mut method: Option<&'static str> = None;

        if let (Some(code), Some(secret)) = (totp_code, identity.two_factor.secret.as_deref()) {
            if self.totp.verify(secret, code) {
                method = Some("TOTP");
            }
        }

        if method.is_none() {
            if let Some(code) = backup_code {
                if let Some(index) = self
                    .totp
                    .find_backup_code(&identity.two_factor.backup_codes, code)
                {
                    let matched = identity.two_factor.backup_codes[index].clone();
                    // Remove-if-present: a concurrent verification of the
                    // same code loses here and falls through to failure.
                    if self.store.remove_backup_code(user_id, &matched).await? {
                        method = Some("backup_code");
                        self.audit
                            .record(
                                AuditEntry::new(AuditAction::BackupCodeUsed, origin)
                                    .user(identity.id)
                                    .email(&identity.email),
                            )
                            .await;
                    }
                }
            }
        }

        let Some(method) = method else {
            self.audit
                .record(
                    AuditEntry::new(AuditAction::LoginFailure, origin)
                        .user(identity.id)
                        .email(&identity.email)
                        .metadata(json!({ "reason": "Invalid 2FA code" })),
                )
                .await;
            return Err(ServiceError::InvalidSecondFactor(
                "Invalid 2FA code or backup code",
            ));
        };

        let token = self.sessions.issue(Session::Full { user_id })?;
        self.audit
            .record(
                AuditEntry::new(AuditAction::TwoFactorVerified, origin)
                    .user(identity.id)
                    .email(&identity.email),
            )
            .await;
        self.audit
            .record(
                AuditEntry::new(AuditAction::LoginSuccess, origin)
                    .user(identity.id)
                    .email(&identity.email)
                    .metadata(json!({ "method": method })),
            )
            .await;

        Ok(SecondFactorVerification {
            token,
            user: identity.view(),
            method,
        })
    }

    /// Generate (but do not enable) a fresh shared secret for a fully
    /// authenticated principal.
    pub async fn initiate_two_factor_setup(
        &self,
        user_id: Uuid,
        origin: &RequestOrigin,
    ) -> Result<TwoFactorEnrollment, ServiceError> {
        let identity = self
            .store
            .find_by_id_with_secrets(user_id)
            .await?
            .ok_or(ServiceError::Store(StoreError::NotFound))?;

        if identity.two_factor.enabled {
            return Err(ServiceError::SecondFactorAlreadyEnabled);
        }

        let enrollment = self.totp.generate_enrollment(&identity.email)?;
        self.store
            .set_pending_two_factor_secret(user_id, enrollment.secret.clone())
            .await?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::TwoFactorSetupInitiated, origin)
                    .user(identity.id)
                    .email(&identity.email),
            )
            .await;

        Ok(enrollment)
    }

    /// Verify the first code against the staged secret, enable the second
    /// factor, and hand back the plaintext backup codes exactly once.
    pub async fn complete_two_factor_setup(
        &self,
        user_id: Uuid,
        code: &str,
        origin: &RequestOrigin,
    ) -> Result<Vec<String>, ServiceError> {
        let identity = self
            .store
            .find_by_id_with_secrets(user_id)
            .await?
            .ok_or(ServiceError::Store(StoreError::NotFound))?;

        if identity.two_factor.enabled {
            return Err(ServiceError::SecondFactorAlreadyEnabled);
        }
        let Some(secret) = identity.two_factor.secret.as_deref() else {
            return Err(ServiceError::SetupNotInitiated);
        };

        if !self.totp.verify(secret, code) {
            return Err(ServiceError::InvalidSecondFactor("Invalid 2FA token"));
        }

        let backup_codes = self.totp.generate_backup_codes();
        let hashes = self.totp.hash_backup_codes(&backup_codes)?;
        self.store.enable_two_factor(user_id, hashes).await?;

        if let Err(e) = self.email.send_two_factor_enabled(&identity.email).await {
            tracing::warn!(error = %e, user_id = %user_id, "Failed to send 2FA-enabled notification");
        }
        self.audit
            .record(
                AuditEntry::new(AuditAction::TwoFactorEnabled, origin)
                    .user(identity.id)
                    .email(&identity.email),
            )
            .await;

        Ok(backup_codes)
    }

    /// Drop the second factor after current-password re-authentication and,
    /// while enabled, a valid TOTP code.
    pub async fn disable_two_factor(
        &self,
        user_id: Uuid,
        password: &str,
        totp_code: Option<&str>,
        origin: &RequestOrigin,
    ) -> Result<(), ServiceError> {
        let identity = self
            .store
            .find_by_id_with_secrets(user_id)
            .await?
            .ok_or(ServiceError::Store(StoreError::NotFound))?;

        verify_password(
            &Password::new(password.to_string()),
            &PasswordHashString::new(identity.password_hash.clone()),
        )
        .map_err(|_| ServiceError::InvalidCredentials)?;

        if identity.two_factor.enabled {
            let code_valid = totp_code.is_some_and(|code| {
                identity
                    .two_factor
                    .secret
                    .as_deref()
                    .is_some_and(|secret| self.totp.verify(secret, code))
            });
            if !code_valid {
                return Err(ServiceError::InvalidSecondFactor("Invalid 2FA token"));
            }
        }

        self.store.disable_two_factor(user_id).await?;
        self.audit
            .record(
                AuditEntry::new(AuditAction::TwoFactorDisabled, origin)
                    .user(identity.id)
                    .email(&identity.email),
            )
            .await;
        Ok(())
    }

    /// Issue a reset code for a known account. Unknown addresses are
    /// reported as such: this path reveals account existence, unlike login.
    pub async fn request_password_reset(
        &self,
        email: &str,
        origin: &RequestOrigin,
    ) -> Result<(), ServiceError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(ServiceError::IdentityNotFound)?;

        let otp = generate_otp(RESET_OTP_DIGITS);
        self.store
            .set_reset_ticket(
                user.id,
                digest_token(&otp),
                Utc::now() + Duration::minutes(self.tickets.reset_otp_minutes),
            )
            .await?;

        if let Err(e) = self.email.send_password_reset_otp(&user.email, &otp).await {
            tracing::warn!(error = %e, user_id = %user.id, "Failed to send password reset email");
        }

        tracing::info!(user_id = %user.id, "Password reset requested");
        self.audit
            .record(
                AuditEntry::new(AuditAction::PasswordResetRequest, origin)
                    .user(user.id)
                    .email(&user.email),
            )
            .await;
        Ok(())
    }

    /// Single-use reset: email + code + expiry must jointly match, and the
    /// ticket is cleared in the same step that installs the new hash.
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
        origin: &RequestOrigin,
    ) -> Result<(), ServiceError> {
        validation::validate_password_policy(new_password).map_err(ServiceError::Validation)?;
        let new_hash = hash_password(&Password::new(new_password.to_string()))?;

        let consumed = self
            .store
            .consume_reset_ticket(email, &digest_token(otp), Utc::now(), new_hash.into_string())
            .await?;

        let Some(user) = consumed else {
            return Err(ServiceError::InvalidOrExpiredTicket("Invalid or expired OTP"));
        };

        tracing::info!(user_id = %user.id, "Password reset successful");
        self.audit
            .record(
                AuditEntry::new(AuditAction::PasswordResetSuccess, origin)
                    .user(user.id)
                    .email(&user.email),
            )
            .await;
        Ok(())
    }

    /// Best-effort logout audit. Never fails: an undecodable credential
    /// still gets its cookie cleared by the handler.
    pub async fn logout(&self, session_token: Option<&str>, origin: &RequestOrigin) {
        if let Some(token) = session_token {
            if let Ok(session) = self.sessions.verify(token) {
                self.audit
                    .record(AuditEntry::new(AuditAction::Logout, origin).user(session.user_id()))
                    .await;
            }
        }
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserView, ServiceError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(ServiceError::Store(StoreError::NotFound))
    }

    /// Apply profile changes, auditing a before/after diff. Returns the
    /// resulting view and whether anything changed; a no-op request
    /// mutates and audits nothing.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
        origin: &RequestOrigin,
    ) -> Result<(UserView, bool), ServiceError> {
        let identity = self
            .store
            .find_by_id_with_secrets(user_id)
            .await?
            .ok_or(ServiceError::Store(StoreError::NotFound))?;

        let mut changes = serde_json::Map::new();
        let mut old_values = serde_json::Map::new();

        let mut new_name: Option<String> = None;
        if let Some(name) = &req.name {
            let trimmed =
                validation::validate_display_name(name).map_err(ServiceError::Validation)?;
            if trimmed != identity.name {
                old_values.insert("name".into(), json!(identity.name));
                changes.insert("name".into(), json!(trimmed));
                new_name = Some(trimmed);
            }
        }

        let mut new_email: Option<String> = None;
        if let Some(email) = &req.email {
            let normalized = normalize_email(email);
            if normalized != identity.email {
                old_values.insert("email".into(), json!(identity.email));
                changes.insert("email".into(), json!(normalized));
                new_email = Some(normalized);
            }
        }

        let mut new_hash: Option<String> = None;
        if let Some(new_password) = &req.new_password {
            let Some(current) = &req.current_password else {
                return Err(ServiceError::Validation(
                    "Current password is required to change password".to_string(),
                ));
            };
            verify_password(
                &Password::new(current.clone()),
                &PasswordHashString::new(identity.password_hash.clone()),
            )
            .map_err(|_| ServiceError::IncorrectPassword)?;
            validation::validate_password_policy(new_password)
                .map_err(ServiceError::Validation)?;
            new_hash = Some(hash_password(&Password::new(new_password.clone()))?.into_string());
            changes.insert("password".into(), json!("updated"));
        }

        if changes.is_empty() {
            return Ok((identity.view(), false));
        }

        let updated = self
            .store
            .update_profile(user_id, new_name, new_email.clone())
            .await
            .map_err(|e| match e {
                StoreError::DuplicateEmail => {
                    ServiceError::Validation("Email is already in use".to_string())
                }
                other => ServiceError::Store(other),
            })?;

        if let Some(hash) = new_hash {
            self.store.set_password_hash(user_id, hash).await?;
        }

        // A changed address must be re-proven; issue the ticket right away
        // instead of waiting for the next login attempt.
        if let Some(changed_email) = new_email {
            self.issue_confirmation_ticket(
                user_id,
                &changed_email,
                Duration::hours(self.tickets.registration_confirm_hours),
                origin,
            )
            .await?;
        }

        self.audit
            .record(
                AuditEntry::new(AuditAction::ProfileUpdate, origin)
                    .user(user_id)
                    .email(&updated.email)
                    .metadata(json!({ "changes": changes, "oldValues": old_values })),
            )
            .await;

        Ok((updated, true))
    }

    /// Commit a fresh confirmation ticket, then dispatch the email
    /// (best-effort) and audit the issuance.
    async fn issue_confirmation_ticket(
        &self,
        user_id: Uuid,
        email: &str,
        validity: Duration,
        origin: &RequestOrigin,
    ) -> Result<(), ServiceError> {
        let token = generate_token();
        self.store
            .set_email_confirm_ticket(user_id, digest_token(&token), Utc::now() + validity)
            .await?;

        if let Err(e) = self
            .email
            .send_login_confirmation(email, &token, &self.base_url)
            .await
        {
            tracing::warn!(error = %e, user_id = %user_id, "Failed to send confirmation email");
        }

        self.audit
            .record(
                AuditEntry::new(AuditAction::EmailConfirmationSent, origin)
                    .user(user_id)
                    .email(email),
            )
            .await;
        Ok(())
    }
}
