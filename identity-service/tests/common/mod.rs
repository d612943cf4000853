//! Test helpers: an in-process application with an in-memory store and a
//! capturing email provider, driven through the real router.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use identity_service::{
    build_router,
    config::{
        Environment, IdentityConfig, RateLimitConfig, SecurityConfig, SessionConfig, SmtpConfig,
        SwaggerConfig, SwaggerMode, TicketConfig, TotpConfig,
    },
    db::InMemoryStore,
    services::{
        AuditRecorder, AuthService, CapturingEmailService, EmailProvider, SessionIssuer,
        TotpEngine,
    },
    AppState,
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const SESSION_COOKIE: &str = "sid";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub email: Arc<CapturingEmailService>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = test_config();

        let store = Arc::new(InMemoryStore::new());
        let audit = AuditRecorder::new(store.clone());
        let email = Arc::new(CapturingEmailService::new());
        let email_provider: Arc<dyn EmailProvider> = email.clone();
        let sessions = SessionIssuer::new(&config.session).expect("session issuer");
        let totp = TotpEngine::new(config.totp.issuer.clone());

        let auth = AuthService::new(
            store.clone(),
            audit.clone(),
            email_provider.clone(),
            sessions.clone(),
            totp,
            config.tickets.clone(),
            config.base_url.clone(),
        );

        let state = AppState {
            config,
            store: store.clone(),
            audit,
            email: email_provider,
            sessions,
            auth,
            login_rate_limiter: create_ip_rate_limiter(10_000, 60),
            register_rate_limiter: create_ip_rate_limiter(10_000, 60),
            password_reset_rate_limiter: create_ip_rate_limiter(10_000, 60),
            ip_rate_limiter: create_ip_rate_limiter(10_000, 60),
        };

        let router = build_router(state.clone()).await.expect("router");

        Self {
            router,
            state,
            store,
            email,
        }
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
        cookie: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn put_json(
        &self,
        path: &str,
        body: serde_json::Value,
        cookie: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder()
            .method("PUT")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.router.clone().oneshot(req).await.unwrap()
    }

    /// Register an account (does not confirm the email).
    pub async fn register(&self, email: &str, name: &str, password: &str) -> StatusCode {
        let res = self
            .post_json(
                "/auth/register",
                serde_json::json!({ "email": email, "name": name, "password": password }),
                None,
            )
            .await;
        res.status()
    }

    /// Register, then consume the emailed confirmation token. Returns the
    /// full-session cookie.
    pub async fn register_and_confirm(&self, email: &str, name: &str, password: &str) -> String {
        let status = self.register(email, name, password).await;
        assert_eq!(status, StatusCode::CREATED);

        let token = self
            .email
            .last_confirmation_token()
            .expect("confirmation email captured");
        let res = self
            .get(&format!("/auth/confirm-login?token={}", token), None)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        session_cookie(&res).expect("session cookie set")
    }

    /// Enroll a second factor on a fully authenticated session. Returns
    /// the base32 secret and the plaintext backup codes.
    pub async fn enroll_two_factor(&self, cookie: &str) -> (String, Vec<String>) {
        let res = self
            .post_json("/auth/2fa/setup", serde_json::json!({}), Some(cookie))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        let secret = body["data"]["secret"].as_str().unwrap().to_string();

        let res = self
            .post_json(
                "/auth/2fa/verify-setup",
                serde_json::json!({ "token": totp_code(&secret) }),
                Some(cookie),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        let codes = body["data"]["backupCodes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c.as_str().unwrap().to_string())
            .collect();

        (secret, codes)
    }
}

pub fn test_config() -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "identity-service".to_string(),
        service_version: "test".to_string(),
        log_level: "warn".to_string(),
        base_url: "http://localhost:3000".to_string(),
        session: SessionConfig {
            signing_key: "integration-test-signing-key-0123456789".to_string(),
            ttl_minutes: 60,
            cookie_name: SESSION_COOKIE.to_string(),
            secure_cookies: false,
        },
        tickets: TicketConfig {
            registration_confirm_hours: 24,
            login_confirm_minutes: 15,
            reset_otp_minutes: 5,
        },
        totp: TotpConfig {
            issuer: "Identity Service".to_string(),
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 587,
            user: String::new(),
            password: String::new(),
            from_email: "no-reply@localhost".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 10_000,
            login_window_seconds: 60,
            register_attempts: 10_000,
            register_window_seconds: 60,
            password_reset_attempts: 10_000,
            password_reset_window_seconds: 60,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
        },
    }
}

/// The session cookie pair (`sid=<token>`) from a response, if set.
pub fn session_cookie(res: &Response) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|s| s.starts_with(&format!("{}=", SESSION_COOKIE)))
        .map(|s| s.split(';').next().unwrap().to_string())
        .filter(|pair| pair.len() > SESSION_COOKIE.len() + 1)
}

/// A `Set-Cookie` clearing the session (empty value), if present.
pub fn cleared_session_cookie(res: &Response) -> bool {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|s| s.starts_with(&format!("{}=;", SESSION_COOKIE)))
}

pub async fn body_json(res: Response) -> serde_json::Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}

/// Current TOTP code for a base32 secret, matching the engine's parameters.
pub fn totp_code(secret_base32: &str) -> String {
    let secret = totp_rs::Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .expect("valid base32 secret");
    let totp = totp_rs::TOTP::new(
        totp_rs::Algorithm::SHA1,
        6,
        2,
        30,
        secret,
        Some("Identity Service".to_string()),
        "test@example.com".to_string(),
    )
    .expect("TOTP instance");
    totp.generate_current().expect("current code")
}

/// A six-digit code guaranteed not to equal `valid`.
pub fn wrong_code(valid: &str) -> String {
    if valid == "000000" {
        "111111".to_string()
    } else {
        "000000".to_string()
    }
}
