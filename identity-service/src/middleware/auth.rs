//! Session extraction and the 2FA-pending authorization gate.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;
use std::net::SocketAddr;

use crate::{
    models::RequestOrigin,
    services::Session,
    AppState,
};

/// Authenticate the request from the session cookie. The decoded
/// [`Session`] (pending or full) lands in request extensions; routes that
/// must not serve pending sessions additionally layer
/// [`require_full_session`].
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(cookie) = jar.get(state.sessions.cookie_name()) else {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Authentication required. Please log in."
        )));
    };

    let session = state
        .sessions
        .verify(cookie.value())
        .map_err(|e| AppError::Unauthorized(anyhow::anyhow!(e.to_string())))?;

    let user = state
        .store
        .find_by_id(session.user_id())
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?;
    if user.is_none() {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "User no longer exists."
        )));
    }

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Reject pending sessions with 403. A pending session authenticates the
/// principal for second-factor verification only.
pub async fn require_full_session(req: Request, next: Next) -> Result<Response, AppError> {
    match req.extensions().get::<Session>() {
        Some(Session::Full { .. }) => Ok(next.run(req).await),
        Some(Session::Pending { .. }) => Err(AppError::Forbidden(anyhow::anyhow!(
            "2FA verification required"
        ))),
        None => Err(AppError::Unauthorized(anyhow::anyhow!(
            "Authentication required. Please log in."
        ))),
    }
}

/// Extractor for the decoded session placed by [`session_middleware`].
pub struct CurrentSession(pub Session);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .copied()
            .map(CurrentSession)
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Session missing from request extensions"
                ))
            })
    }
}

/// Infallible request-origin extractor for audit entries: first
/// `x-forwarded-for` hop, else the socket peer, else "unknown"; plus the
/// user-agent header.
pub struct ClientMeta(pub RequestOrigin);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok(ClientMeta(RequestOrigin { ip, user_agent }))
    }
}
