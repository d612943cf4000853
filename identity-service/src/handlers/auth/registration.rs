use axum::{http::StatusCode, response::IntoResponse, Json};
use axum::extract::State;
use serde_json::json;
use service_core::error::AppError;

use crate::{
    dtos::auth::RegisterRequest,
    middleware::ClientMeta,
    utils::ValidatedJson,
    AppState,
};

/// Register a new identity and dispatch the confirmation email.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered; confirmation email sent"),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    meta: ClientMeta,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.register(req, &meta.0).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Registration successful! Please check your email to confirm your account.",
            "data": {
                "email": user.email,
                "name": user.name,
            }
        })),
    ))
}
