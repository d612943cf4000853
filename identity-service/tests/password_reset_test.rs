mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};
use identity_service::models::AuditAction;

#[tokio::test]
async fn forgot_password_reveals_unknown_addresses() {
    // Deliberate asymmetry with login, which never reveals existence.
    let app = TestApp::spawn().await;

    let res = app
        .post_json(
            "/auth/forgot-password",
            serde_json::json!({ "email": "ghost@example.com" }),
            None,
        )
        .await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = body_json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Email id does not exist");
}

#[tokio::test]
async fn reset_flow_is_single_use_and_audited() {
    let app = TestApp::spawn().await;
    app.register_and_confirm("alice@example.com", "Alice", "Passw0rd!")
        .await;

    let res = app
        .post_json(
            "/auth/forgot-password",
            serde_json::json!({ "email": "alice@example.com" }),
            None,
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let otp = app.email.last_otp().expect("reset code captured");
    assert_eq!(otp.len(), 6);
    assert!(otp.chars().all(|c| c.is_ascii_digit()));

    // Wrong code is rejected without consuming the ticket.
    let res = app
        .post_json(
            "/auth/reset-password",
            serde_json::json!({
                "email": "alice@example.com",
                "otp": "000000",
                "newPassword": "NewPassw0rd"
            }),
            None,
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["message"], "Invalid or expired OTP");

    // New password must satisfy the registration policy.
    let res = app
        .post_json(
            "/auth/reset-password",
            serde_json::json!({
                "email": "alice@example.com",
                "otp": otp,
                "newPassword": "alllowercase1"
            }),
            None,
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Correct code: password replaced, ticket consumed.
    let res = app
        .post_json(
            "/auth/reset-password",
            serde_json::json!({
                "email": "alice@example.com",
                "otp": otp,
                "newPassword": "NewPassw0rd"
            }),
            None,
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    // Replay of the consumed code fails.
    let res = app
        .post_json(
            "/auth/reset-password",
            serde_json::json!({
                "email": "alice@example.com",
                "otp": otp,
                "newPassword": "OtherPassw0rd1"
            }),
            None,
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // The old password is gone, the new one logs in.
    let res = app
        .post_json(
            "/auth/login",
            serde_json::json!({ "email": "alice@example.com", "password": "Passw0rd!" }),
            None,
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = app
        .post_json(
            "/auth/login",
            serde_json::json!({ "email": "alice@example.com", "password": "NewPassw0rd" }),
            None,
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let requests = app
        .state
        .audit
        .entries_for_action(AuditAction::PasswordResetRequest, 10)
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);
    let successes = app
        .state
        .audit
        .entries_for_action(AuditAction::PasswordResetSuccess, 10)
        .await
        .unwrap();
    assert_eq!(successes.len(), 1);
}

#[tokio::test]
async fn reset_does_not_log_the_user_in() {
    let app = TestApp::spawn().await;
    app.register_and_confirm("bob@example.com", "Bob", "Passw0rd!")
        .await;

    app.post_json(
        "/auth/forgot-password",
        serde_json::json!({ "email": "bob@example.com" }),
        None,
    )
    .await;
    let otp = app.email.last_otp().unwrap();

    let res = app
        .post_json(
            "/auth/reset-password",
            serde_json::json!({
                "email": "bob@example.com",
                "otp": otp,
                "newPassword": "NewPassw0rd"
            }),
            None,
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(common::session_cookie(&res).is_none());
}

#[tokio::test]
async fn a_fresh_request_replaces_the_previous_code() {
    let app = TestApp::spawn().await;
    app.register_and_confirm("carol@example.com", "Carol", "Passw0rd!")
        .await;

    app.post_json(
        "/auth/forgot-password",
        serde_json::json!({ "email": "carol@example.com" }),
        None,
    )
    .await;
    let first_otp = app.email.last_otp().unwrap();

    app.post_json(
        "/auth/forgot-password",
        serde_json::json!({ "email": "carol@example.com" }),
        None,
    )
    .await;
    let second_otp = app.email.last_otp().unwrap();

    if first_otp != second_otp {
        // The replaced code is dead even though it never expired.
        let res = app
            .post_json(
                "/auth/reset-password",
                serde_json::json!({
                    "email": "carol@example.com",
                    "otp": first_otp,
                    "newPassword": "NewPassw0rd"
                }),
                None,
            )
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    let res = app
        .post_json(
            "/auth/reset-password",
            serde_json::json!({
                "email": "carol@example.com",
                "otp": second_otp,
                "newPassword": "NewPassw0rd"
            }),
            None,
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
}
