pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::IdentityConfig;
use crate::db::CredentialStore;
use crate::services::{AuditRecorder, AuthService, EmailProvider, SessionIssuer};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::registration::register,
        handlers::auth::session::login,
        handlers::auth::session::confirm_login,
        handlers::auth::session::logout,
        handlers::auth::two_factor::verify_two_factor,
        handlers::auth::two_factor::setup_two_factor,
        handlers::auth::two_factor::verify_setup,
        handlers::auth::two_factor::disable_two_factor,
        handlers::auth::password::forgot_password,
        handlers::auth::password::reset_password,
        handlers::user::get_me,
        handlers::user::update_me,
    ),
    components(
        schemas(
            dtos::ApiResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::LoginRequest,
            dtos::auth::VerifyTwoFactorRequest,
            dtos::auth::VerifySetupRequest,
            dtos::auth::DisableTwoFactorRequest,
            dtos::auth::ForgotPasswordRequest,
            dtos::auth::ResetPasswordRequest,
            dtos::user::UpdateProfileRequest,
            models::UserView,
        )
    ),
    tags(
        (name = "Authentication", description = "Registration, login lifecycle, and password recovery"),
        (name = "Two-Factor Authentication", description = "TOTP enrollment, verification, and backup codes"),
        (name = "User", description = "Profile management"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub store: Arc<dyn CredentialStore>,
    pub audit: AuditRecorder,
    pub email: Arc<dyn EmailProvider>,
    pub sessions: SessionIssuer,
    pub auth: AuthService,
    pub login_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub register_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub password_reset_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub ip_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Authentication endpoints each carry their own quota; the throttle
    // runs before any state-machine logic.
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let password_reset_routes = Router::new()
        .route("/auth/forgot-password", post(handlers::auth::forgot_password))
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .layer(from_fn_with_state(
            state.password_reset_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    // The 2FA-verification route accepts pending sessions; every other
    // protected route additionally requires a full session.
    let pending_session_routes = Router::new()
        .route("/auth/verify-2fa", post(handlers::auth::verify_two_factor))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    let protected_routes = Router::new()
        .route("/auth/2fa/setup", post(handlers::auth::setup_two_factor))
        .route("/auth/2fa/verify-setup", post(handlers::auth::verify_setup))
        .route("/auth/2fa/disable", post(handlers::auth::disable_two_factor))
        .route(
            "/users/me",
            get(handlers::user::get_me).put(handlers::user::update_me),
        )
        .layer(from_fn(middleware::require_full_session))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    let mut app = Router::new().route("/health", get(health_check));

    let swagger_enabled = match state.config.environment {
        config::Environment::Dev => true,
        config::Environment::Prod => match state.config.swagger.enabled {
            config::SwaggerMode::Public | config::SwaggerMode::Authenticated => true,
            config::SwaggerMode::Disabled => false,
        },
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .route("/auth/confirm-login", get(handlers::auth::confirm_login))
        .route("/auth/logout", post(handlers::auth::logout))
        .merge(login_route)
        .merge(register_route)
        .merge(password_reset_routes)
        .merge(pending_session_routes)
        .merge(protected_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                        .collect::<Vec<_>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .allow_credentials(true),
        );

    Ok(app)
}

/// Service health check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy")),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
    })))
}
