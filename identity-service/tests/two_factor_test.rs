mod common;

use axum::http::StatusCode;
use common::{body_json, session_cookie, totp_code, wrong_code, TestApp};
use identity_service::db::CredentialStore;
use identity_service::models::AuditAction;
use identity_service::services::BACKUP_CODE_COUNT;

#[tokio::test]
async fn setup_flow_enables_totp_and_returns_backup_codes_once() {
    let app = TestApp::spawn().await;
    let cookie = app
        .register_and_confirm("alice@example.com", "Alice", "Passw0rd!")
        .await;

    let res = app
        .post_json("/auth/2fa/setup", serde_json::json!({}), Some(&cookie))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let secret = body["data"]["secret"].as_str().unwrap().to_string();
    assert!(!secret.is_empty());
    assert_eq!(body["data"]["manualEntryKey"], secret.as_str());
    assert!(body["data"]["qrCode"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));

    // A generated-but-unverified secret does not make login require 2FA.
    let res = app
        .post_json(
            "/auth/login",
            serde_json::json!({ "email": "alice@example.com", "password": "Passw0rd!" }),
            None,
        )
        .await;
    assert_eq!(body_json(res).await["requires2FA"], false);

    // Wrong first code: setup not completed.
    let valid = totp_code(&secret);
    let res = app
        .post_json(
            "/auth/2fa/verify-setup",
            serde_json::json!({ "token": wrong_code(&valid) }),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Correct code: enabled, backup codes handed out exactly once.
    let res = app
        .post_json(
            "/auth/2fa/verify-setup",
            serde_json::json!({ "token": totp_code(&secret) }),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let codes = body["data"]["backupCodes"].as_array().unwrap();
    assert_eq!(codes.len(), BACKUP_CODE_COUNT);

    let enabled = app
        .state
        .audit
        .entries_for_action(AuditAction::TwoFactorEnabled, 10)
        .await
        .unwrap();
    assert_eq!(enabled.len(), 1);

    // Notification email went out on top of the confirmation one.
    assert!(app
        .email
        .sent()
        .iter()
        .any(|m| matches!(m, identity_service::services::SentEmail::TwoFactorEnabled { .. })));

    // Re-running setup is a precondition violation now.
    let res = app
        .post_json("/auth/2fa/setup", serde_json::json!({}), Some(&cookie))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_setup_without_initiation_is_rejected() {
    let app = TestApp::spawn().await;
    let cookie = app
        .register_and_confirm("bob@example.com", "Bob", "Passw0rd!")
        .await;

    let res = app
        .post_json(
            "/auth/2fa/verify-setup",
            serde_json::json!({ "token": "123456" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["message"],
        "Please initiate 2FA setup first"
    );
}

#[tokio::test]
async fn enrolled_login_parks_behind_pending_session() {
    let app = TestApp::spawn().await;
    let cookie = app
        .register_and_confirm("carol@example.com", "Carol", "Passw0rd!")
        .await;
    let (secret, _codes) = app.enroll_two_factor(&cookie).await;

    // Login now reports requires2FA and issues a pending session.
    let res = app
        .post_json(
            "/auth/login",
            serde_json::json!({ "email": "carol@example.com", "password": "Passw0rd!" }),
            None,
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let pending = session_cookie(&res).expect("pending session cookie");
    let body = body_json(res).await;
    assert_eq!(body["requires2FA"], true);

    // The pending session is rejected everywhere except verification.
    let res = app.get("/users/me", Some(&pending)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = app
        .post_json("/auth/2fa/setup", serde_json::json!({}), Some(&pending))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Wrong code fails and is audited.
    let valid = totp_code(&secret);
    let res = app
        .post_json(
            "/auth/verify-2fa",
            serde_json::json!({ "token": wrong_code(&valid) }),
            Some(&pending),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Valid TOTP completes the login with a full session.
    let res = app
        .post_json(
            "/auth/verify-2fa",
            serde_json::json!({ "token": totp_code(&secret) }),
            Some(&pending),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let full = session_cookie(&res).expect("full session cookie");

    let res = app.get("/users/me", Some(&full)).await;
    assert_eq!(res.status(), StatusCode::OK);

    // The completing LOGIN_SUCCESS entry names the method.
    let successes = app
        .state
        .audit
        .entries_for_action(AuditAction::LoginSuccess, 1)
        .await
        .unwrap();
    assert_eq!(successes[0].metadata["method"], "TOTP");
}

#[tokio::test]
async fn verify_without_pending_session_is_rejected() {
    let app = TestApp::spawn().await;
    let cookie = app
        .register_and_confirm("dana@example.com", "Dana", "Passw0rd!")
        .await;

    // Full session, no pending verification step.
    let res = app
        .post_json(
            "/auth/verify-2fa",
            serde_json::json!({ "token": "123456" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["message"],
        "2FA verification not required"
    );
}

#[tokio::test]
async fn backup_codes_are_strictly_single_use() {
    let app = TestApp::spawn().await;
    let cookie = app
        .register_and_confirm("erin@example.com", "Erin", "Passw0rd!")
        .await;
    let (_secret, codes) = app.enroll_two_factor(&cookie).await;

    let login_body =
        serde_json::json!({ "email": "erin@example.com", "password": "Passw0rd!" });

    // First use succeeds and removes exactly one code from the set.
    let res = app.post_json("/auth/login", login_body.clone(), None).await;
    let pending = session_cookie(&res).unwrap();
    let res = app
        .post_json(
            "/auth/verify-2fa",
            serde_json::json!({ "backupCode": codes[0] }),
            Some(&pending),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let user = app
        .state
        .store
        .find_by_email("erin@example.com")
        .await
        .unwrap()
        .unwrap();
    let stored = app
        .state
        .store
        .find_by_id_with_secrets(user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.two_factor.backup_codes.len(), BACKUP_CODE_COUNT - 1);

    let used = app
        .state
        .audit
        .entries_for_action(AuditAction::BackupCodeUsed, 10)
        .await
        .unwrap();
    assert_eq!(used.len(), 1);

    // Second use of the same code fails; the method recorded for the
    // earlier success was the backup code.
    let res = app.post_json("/auth/login", login_body, None).await;
    let pending = session_cookie(&res).unwrap();
    let res = app
        .post_json(
            "/auth/verify-2fa",
            serde_json::json!({ "backupCode": codes[0] }),
            Some(&pending),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let successes = app
        .state
        .audit
        .entries_for_action(AuditAction::LoginSuccess, 10)
        .await
        .unwrap();
    assert_eq!(successes[0].metadata["method"], "backup_code");
}

#[tokio::test]
async fn disable_requires_password_and_current_code() {
    let app = TestApp::spawn().await;
    let cookie = app
        .register_and_confirm("frank@example.com", "Frank", "Passw0rd!")
        .await;
    let (secret, _codes) = app.enroll_two_factor(&cookie).await;

    // Wrong password: 401, state unchanged end-to-end.
    let res = app
        .post_json(
            "/auth/2fa/disable",
            serde_json::json!({ "password": "WrongPass1", "token": totp_code(&secret) }),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .post_json(
            "/auth/login",
            serde_json::json!({ "email": "frank@example.com", "password": "Passw0rd!" }),
            None,
        )
        .await;
    assert_eq!(body_json(res).await["requires2FA"], true);

    // Right password but missing code: still enabled.
    let res = app
        .post_json(
            "/auth/2fa/disable",
            serde_json::json!({ "password": "Passw0rd!" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Password + valid code: disabled, and login goes straight through.
    let res = app
        .post_json(
            "/auth/2fa/disable",
            serde_json::json!({ "password": "Passw0rd!", "token": totp_code(&secret) }),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .post_json(
            "/auth/login",
            serde_json::json!({ "email": "frank@example.com", "password": "Passw0rd!" }),
            None,
        )
        .await;
    assert_eq!(body_json(res).await["requires2FA"], false);

    let disabled = app
        .state
        .audit
        .entries_for_action(AuditAction::TwoFactorDisabled, 10)
        .await
        .unwrap();
    assert_eq!(disabled.len(), 1);
}
