use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Partial profile update. A password change requires `currentPassword`;
/// an email change resets the confirmed flag and re-triggers confirmation.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,

    pub current_password: Option<String>,

    pub new_password: Option<String>,
}
