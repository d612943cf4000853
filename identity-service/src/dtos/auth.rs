use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Please provide a valid email"))]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "Alice")]
    pub name: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    #[schema(example = "Passw0rd!", min_length = 8)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Please provide password"))]
    #[schema(example = "Passw0rd!")]
    pub password: String,
}

/// Query string of the confirmation link. The token is checked for
/// presence in the handler so the missing-token case gets the shared
/// envelope rather than a bare extractor rejection.
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct ConfirmLoginQuery {
    #[param(example = "5d41402abc4b2a76b9719d911017c592")]
    pub token: Option<String>,
}

/// One of `token` (TOTP) or `backupCode` must be present; TOTP wins when
/// both are supplied.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTwoFactorRequest {
    pub token: Option<String>,
    pub backup_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifySetupRequest {
    #[validate(length(min = 1, message = "Please provide 2FA token"))]
    #[schema(example = "123456")]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DisableTwoFactorRequest {
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    /// Required while 2FA is enabled.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please provide a valid email"))]
    #[schema(example = "alice@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Please provide a valid email"))]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Please provide OTP"))]
    #[schema(example = "482913")]
    pub otp: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}
