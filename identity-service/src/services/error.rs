use service_core::error::AppError;
use thiserror::Error;

use crate::db::StoreError;

/// Failures of the authentication state machine, translated to HTTP at the
/// request boundary. Authentication failures share a 401 and deliberately
/// vague messages; precondition violations are 400s.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    /// Identical for unknown account and wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidOrExpiredTicket(&'static str),

    #[error("{0}")]
    InvalidSecondFactor(&'static str),

    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Email already registered")]
    DuplicateIdentity,

    #[error("Email id does not exist")]
    IdentityNotFound,

    #[error("2FA verification not required")]
    SecondFactorNotRequired,

    #[error("2FA is already enabled")]
    SecondFactorAlreadyEnabled,

    #[error("Please initiate 2FA setup first")]
    SetupNotInitiated,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dependency(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid email or password"))
            }
            ServiceError::InvalidOrExpiredTicket(msg) => AppError::AuthError(anyhow::anyhow!(msg)),
            ServiceError::InvalidSecondFactor(msg) => AppError::AuthError(anyhow::anyhow!(msg)),
            ServiceError::IncorrectPassword => {
                AppError::AuthError(anyhow::anyhow!("Current password is incorrect"))
            }
            ServiceError::DuplicateIdentity => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::IdentityNotFound => {
                AppError::NotFound(anyhow::anyhow!("Email id does not exist"))
            }
            ServiceError::SecondFactorNotRequired => {
                AppError::BadRequest(anyhow::anyhow!("2FA verification not required"))
            }
            ServiceError::SecondFactorAlreadyEnabled => {
                AppError::BadRequest(anyhow::anyhow!("2FA is already enabled"))
            }
            ServiceError::SetupNotInitiated => {
                AppError::BadRequest(anyhow::anyhow!("Please initiate 2FA setup first"))
            }
            ServiceError::Store(StoreError::DuplicateEmail) => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::Store(StoreError::NotFound) => {
                AppError::NotFound(anyhow::anyhow!("User not found"))
            }
            ServiceError::Dependency(e) => AppError::InternalError(e),
        }
    }
}
