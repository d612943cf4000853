pub mod audit;
pub mod auth;
pub mod email;
pub mod error;
pub mod session;
pub mod totp;

pub use audit::AuditRecorder;
pub use auth::{AuthService, ConfirmOutcome, LoginOutcome, SecondFactorVerification};
pub use email::{
    CapturingEmailService, EmailProvider, MockEmailService, SentEmail, SmtpEmailService,
};
pub use error::ServiceError;
pub use session::{Session, SessionError, SessionIssuer};
pub use totp::{TotpEngine, TwoFactorEnrollment, BACKUP_CODE_COUNT};
