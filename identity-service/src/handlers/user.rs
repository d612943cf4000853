use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

use crate::{
    dtos::user::UpdateProfileRequest,
    middleware::{ClientMeta, CurrentSession},
    utils::ValidatedJson,
    AppState,
};

/// Current user's profile projection.
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Profile returned"),
        (status = 401, description = "Unauthenticated"),
        (status = 403, description = "2FA verification pending")
    ),
    tag = "User"
)]
pub async fn get_me(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.profile(session.0.user_id()).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Profile fetched successfully",
        "data": { "user": user }
    })))
}

/// Apply profile changes. Name and email changes take effect immediately
/// (email reverts to unconfirmed and triggers a fresh confirmation email);
/// password changes require the current password.
#[utoipa::path(
    put,
    path = "/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated (or no changes)"),
        (status = 400, description = "Validation error or email in use"),
        (status = 401, description = "Current password incorrect"),
        (status = 403, description = "2FA verification pending")
    ),
    tag = "User"
)]
pub async fn update_me(
    State(state): State<AppState>,
    meta: ClientMeta,
    session: CurrentSession,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, changed) = state
        .auth
        .update_profile(session.0.user_id(), req, &meta.0)
        .await?;

    let message = if changed {
        "Profile updated successfully"
    } else {
        "No changes made"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": { "user": user }
    })))
}
