pub mod auth;
pub mod user;

use serde::Serialize;
use utoipa::ToSchema;

/// The envelope every endpoint answers with. Handlers that also carry
/// top-level hints (`requires2FA`, `has2FA`) build the envelope inline with
/// `serde_json::json!` instead.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}
