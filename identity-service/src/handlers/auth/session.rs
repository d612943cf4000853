use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use service_core::error::AppError;

use super::user_summary;
use crate::{
    dtos::auth::{ConfirmLoginQuery, LoginRequest},
    dtos::ApiResponse,
    middleware::ClientMeta,
    services::{ConfirmOutcome, LoginOutcome},
    utils::ValidatedJson,
    AppState,
};

/// Login with email and password. Depending on account state this either
/// completes, parks the principal behind second-factor verification, or
/// falls back to email confirmation without issuing any session.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login handled; see `requires2FA` and cookie"),
        (status = 400, description = "Missing or malformed fields"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    meta: ClientMeta,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response, AppError> {
    match state.auth.login(req, &meta.0).await? {
        LoginOutcome::SecondFactorRequired { token, user } => {
            let jar = jar.add(state.sessions.build_cookie(token));
            Ok((
                jar,
                Json(json!({
                    "success": true,
                    "message": "Please enter your 2FA code.",
                    "requires2FA": true,
                    "data": { "user": user_summary(&user) }
                })),
            )
                .into_response())
        }
        LoginOutcome::Authenticated { token, user } => {
            let jar = jar.add(state.sessions.build_cookie(token));
            Ok((
                jar,
                Json(json!({
                    "success": true,
                    "message": "Login successful",
                    "requires2FA": false,
                    "data": { "user": user_summary(&user) }
                })),
            )
                .into_response())
        }
        LoginOutcome::ConfirmationEmailSent { has_two_factor } => Ok(Json(json!({
            "success": true,
            "message": "Confirmation email sent! Please check your inbox and click the link to login.",
            "has2FA": has_two_factor,
        }))
        .into_response()),
    }
}

/// Complete a login by consuming the emailed confirmation token.
#[utoipa::path(
    get,
    path = "/auth/confirm-login",
    params(ConfirmLoginQuery),
    responses(
        (status = 200, description = "Email confirmed; see `requires2FA` and cookie"),
        (status = 400, description = "Missing token"),
        (status = 401, description = "Invalid or expired confirmation link")
    ),
    tag = "Authentication"
)]
pub async fn confirm_login(
    State(state): State<AppState>,
    meta: ClientMeta,
    jar: CookieJar,
    Query(query): Query<ConfirmLoginQuery>,
) -> Result<Response, AppError> {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid or missing token"
        )));
    };

    match state.auth.confirm_email(&token, &meta.0).await? {
        ConfirmOutcome::SecondFactorRequired { token, user } => {
            let jar = jar.add(state.sessions.build_cookie(token));
            Ok((
                jar,
                Json(json!({
                    "success": true,
                    "message": "Email confirmed. Please enter your 2FA code.",
                    "requires2FA": true,
                    "data": { "user": user_summary(&user) }
                })),
            )
                .into_response())
        }
        ConfirmOutcome::Authenticated { token, user } => {
            let jar = jar.add(state.sessions.build_cookie(token));
            Ok((
                jar,
                Json(json!({
                    "success": true,
                    "message": "Login Granted",
                    "requires2FA": false,
                    "data": { "user": user_summary(&user) }
                })),
            )
                .into_response())
        }
    }
}

/// Logout: best-effort audit, then overwrite the cookie with an expired
/// empty value. Never fails.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 200, description = "Logged out")),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    meta: ClientMeta,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = jar
        .get(state.sessions.cookie_name())
        .map(|c| c.value().to_string());
    state.auth.logout(token.as_deref(), &meta.0).await;

    let jar = jar.add(state.sessions.clear_cookie());
    Ok((jar, Json(ApiResponse::message("Logged out successfully"))))
}
