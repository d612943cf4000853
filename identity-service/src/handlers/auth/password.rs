use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{ForgotPasswordRequest, ResetPasswordRequest},
    dtos::ApiResponse,
    middleware::ClientMeta,
    utils::ValidatedJson,
    AppState,
};

/// Issue a short-lived reset code by email.
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset code sent"),
        (status = 404, description = "Unknown email")
    ),
    tag = "Authentication"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    meta: ClientMeta,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.request_password_reset(&req.email, &meta.0).await?;

    Ok(Json(ApiResponse::message(
        "Password reset code sent to your email",
    )))
}

/// Replace the password by presenting the emailed one-time code. Does not
/// log the user in.
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid or expired OTP")
    ),
    tag = "Authentication"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    meta: ClientMeta,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .reset_password(&req.email, &req.otp, &req.new_password, &meta.0)
        .await?;

    Ok(Json(ApiResponse::message(
        "Password reset successful. Please log in.",
    )))
}
