use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use service_core::error::AppError;

use super::user_summary;
use crate::{
    dtos::auth::{DisableTwoFactorRequest, VerifySetupRequest, VerifyTwoFactorRequest},
    dtos::ApiResponse,
    middleware::{ClientMeta, CurrentSession},
    utils::ValidatedJson,
    AppState,
};

/// Complete a pending login with a TOTP code or a backup code.
#[utoipa::path(
    post,
    path = "/auth/verify-2fa",
    request_body = VerifyTwoFactorRequest,
    responses(
        (status = 200, description = "Second factor verified; full session issued"),
        (status = 400, description = "2FA verification not required"),
        (status = 401, description = "Invalid 2FA code or backup code")
    ),
    tag = "Two-Factor Authentication"
)]
pub async fn verify_two_factor(
    State(state): State<AppState>,
    meta: ClientMeta,
    session: CurrentSession,
    jar: CookieJar,
    Json(req): Json<VerifyTwoFactorRequest>,
) -> Result<Response, AppError> {
    let verification = state
        .auth
        .verify_second_factor(
            session.0,
            req.token.as_deref(),
            req.backup_code.as_deref(),
            &meta.0,
        )
        .await?;

    let jar = jar.add(state.sessions.build_cookie(verification.token));
    Ok((
        jar,
        Json(json!({
            "success": true,
            "message": "Login successful",
            "data": { "user": user_summary(&verification.user) }
        })),
    )
        .into_response())
}

/// Generate a shared secret and provisioning QR. Nothing is enabled until
/// the first code is verified.
#[utoipa::path(
    post,
    path = "/auth/2fa/setup",
    responses(
        (status = 200, description = "Provisioning payload returned"),
        (status = 400, description = "2FA already enabled"),
        (status = 401, description = "Unauthenticated"),
        (status = 403, description = "2FA verification pending")
    ),
    tag = "Two-Factor Authentication"
)]
pub async fn setup_two_factor(
    State(state): State<AppState>,
    meta: ClientMeta,
    session: CurrentSession,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = state
        .auth
        .initiate_two_factor_setup(session.0.user_id(), &meta.0)
        .await?;

    Ok(Json(ApiResponse::with_data(
        "Scan the QR code with your authenticator app",
        json!({
            "qrCode": enrollment.qr_code,
            "secret": enrollment.secret,
            "manualEntryKey": enrollment.secret,
            "otpauthUrl": enrollment.otpauth_url,
        }),
    )))
}

/// Verify the first code against the staged secret and enable 2FA. The
/// plaintext backup codes in the response are shown exactly once.
#[utoipa::path(
    post,
    path = "/auth/2fa/verify-setup",
    request_body = VerifySetupRequest,
    responses(
        (status = 200, description = "2FA enabled; backup codes returned once"),
        (status = 400, description = "Setup not initiated"),
        (status = 401, description = "Invalid 2FA token")
    ),
    tag = "Two-Factor Authentication"
)]
pub async fn verify_setup(
    State(state): State<AppState>,
    meta: ClientMeta,
    session: CurrentSession,
    ValidatedJson(req): ValidatedJson<VerifySetupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let backup_codes = state
        .auth
        .complete_two_factor_setup(session.0.user_id(), &req.token, &meta.0)
        .await?;

    Ok(Json(ApiResponse::with_data(
        "2FA enabled successfully! Save your backup codes.",
        json!({ "backupCodes": backup_codes }),
    )))
}

/// Disable 2FA after password re-authentication (and, while enabled, a
/// valid TOTP code).
#[utoipa::path(
    post,
    path = "/auth/2fa/disable",
    request_body = DisableTwoFactorRequest,
    responses(
        (status = 200, description = "2FA disabled"),
        (status = 400, description = "Missing password"),
        (status = 401, description = "Wrong password or 2FA token")
    ),
    tag = "Two-Factor Authentication"
)]
pub async fn disable_two_factor(
    State(state): State<AppState>,
    meta: ClientMeta,
    session: CurrentSession,
    ValidatedJson(req): ValidatedJson<DisableTwoFactorRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .disable_two_factor(
            session.0.user_id(),
            &req.password,
            req.token.as_deref(),
            &meta.0,
        )
        .await?;

    Ok(Json(ApiResponse::message("2FA disabled successfully")))
}
