//! Outbound email: confirmation links, reset codes, 2FA notifications.
//!
//! The state machine only sees the [`EmailProvider`] contract. Dispatch is
//! best-effort by policy: user-visible state is committed before any send,
//! and a send failure is logged, never propagated as a request failure.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, message::MultiPart, message::SinglePart,
    transport::smtp::authentication::Credentials, Message, SmtpTransport, Transport,
};
use service_core::error::AppError;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Deliver the login/registration confirmation link.
    async fn send_login_confirmation(
        &self,
        to_email: &str,
        token: &str,
        base_url: &str,
    ) -> Result<(), AppError>;

    /// Deliver the password-reset one-time code.
    async fn send_password_reset_otp(&self, to_email: &str, otp: &str) -> Result<(), AppError>;

    /// Notify that a second factor was enabled on the account.
    async fn send_two_factor_enabled(&self, to_email: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        let email = Message::builder()
            .from(self.from_email.parse().map_err(
                |e: lettre::address::AddressError| AppError::InternalError(e.into()),
            )?)
            .to(to_email.parse().map_err(
                |e: lettre::address::AddressError| AppError::InternalError(e.into()),
            )?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::InternalError(e.into()))?;

        // SMTP send is blocking; keep it off the async runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send_login_confirmation(
        &self,
        to_email: &str,
        token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let confirm_url = format!("{}/confirm-login?token={}", base_url, token);

        let html_body = format!(
            r###"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Confirm Your Login</h2>
                    <p>We received a login request for your account. To complete the login process, click the link below:</p>
                    <p>
                        <a href="{0}" style="background-color: #4F46E5; color: white; padding: 14px 28px; text-decoration: none; border-radius: 6px;">
                            Confirm Login
                        </a>
                    </p>
                    <p style="color: #666; font-size: 12px;">Or copy and paste this link in your browser: {0}</p>
                    <p style="color: #666; font-size: 12px;">
                        If you didn't request this login, please ignore this email and secure your account.
                    </p>
                </body>
            </html>"###,
            confirm_url
        );

        let plain_body = format!(
            "Confirm Your Login\n\nWe received a login request for your account. Visit the following link to complete the login process:\n\n{}\n\nIf you didn't request this login, please ignore this email and secure your account.",
            confirm_url
        );

        self.send_email(to_email, "Confirm Your Login", &plain_body, &html_body)
            .await
    }

    async fn send_password_reset_otp(&self, to_email: &str, otp: &str) -> Result<(), AppError> {
        let html_body = format!(
            r###"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Password Reset Request</h2>
                    <p>We received a request to reset your password. Use the following code:</p>
                    <p style="font-size: 36px; font-weight: bold; letter-spacing: 8px;">{}</p>
                    <p style="color: #666; font-size: 12px;">
                        This code will expire in 5 minutes. If you didn't request this, please secure your account immediately.
                    </p>
                </body>
            </html>"###,
            otp
        );

        let plain_body = format!(
            "Password Reset Request\n\nWe received a request to reset your password. Use the following code:\n\n{}\n\nThis code will expire in 5 minutes. If you didn't request this, please secure your account immediately.",
            otp
        );

        self.send_email(to_email, "Password Reset Code", &plain_body, &html_body)
            .await
    }

    async fn send_two_factor_enabled(&self, to_email: &str) -> Result<(), AppError> {
        let html_body = r###"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Two-Factor Authentication Enabled</h2>
                    <p>Two-factor authentication has been successfully enabled on your account.</p>
                    <p style="color: #DC2626; font-weight: bold;">If you didn't enable 2FA, contact support immediately.</p>
                </body>
            </html>"###;

        let plain_body = "Two-Factor Authentication Enabled\n\nTwo-factor authentication has been successfully enabled on your account.\n\nIf you didn't enable 2FA, contact support immediately.";

        self.send_email(
            to_email,
            "Two-Factor Authentication Enabled",
            plain_body,
            html_body,
        )
        .await
    }
}

/// No-op provider for local development without an SMTP relay.
#[derive(Clone)]
pub struct MockEmailService;

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_login_confirmation(
        &self,
        _to_email: &str,
        _token: &str,
        _base_url: &str,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn send_password_reset_otp(&self, _to_email: &str, _otp: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn send_two_factor_enabled(&self, _to_email: &str) -> Result<(), AppError> {
        Ok(())
    }
}

/// Record of a dispatched message, for test assertions.
#[derive(Debug, Clone)]
pub enum SentEmail {
    LoginConfirmation { to: String, token: String },
    PasswordResetOtp { to: String, otp: String },
    TwoFactorEnabled { to: String },
}

/// Provider that records every message instead of sending it, so tests can
/// harvest confirmation tokens and reset codes.
#[derive(Default)]
pub struct CapturingEmailService {
    sent: Mutex<Vec<SentEmail>>,
}

impl CapturingEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("email capture lock poisoned").clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("email capture lock poisoned").len()
    }

    pub fn last_confirmation_token(&self) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find_map(|m| match m {
                SentEmail::LoginConfirmation { token, .. } => Some(token.clone()),
                _ => None,
            })
    }

    pub fn last_otp(&self) -> Option<String> {
        self.sent().iter().rev().find_map(|m| match m {
            SentEmail::PasswordResetOtp { otp, .. } => Some(otp.clone()),
            _ => None,
        })
    }

    fn push(&self, mail: SentEmail) {
        self.sent.lock().expect("email capture lock poisoned").push(mail);
    }
}

#[async_trait]
impl EmailProvider for CapturingEmailService {
    async fn send_login_confirmation(
        &self,
        to_email: &str,
        token: &str,
        _base_url: &str,
    ) -> Result<(), AppError> {
        self.push(SentEmail::LoginConfirmation {
            to: to_email.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }

    async fn send_password_reset_otp(&self, to_email: &str, otp: &str) -> Result<(), AppError> {
        self.push(SentEmail::PasswordResetOtp {
            to: to_email.to_string(),
            otp: otp.to_string(),
        });
        Ok(())
    }

    async fn send_two_factor_enabled(&self, to_email: &str) -> Result<(), AppError> {
        self.push(SentEmail::TwoFactorEnabled {
            to: to_email.to_string(),
        });
        Ok(())
    }
}
