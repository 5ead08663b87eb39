mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{token_from_mail, TestApp, PASSWORD};
use complaint_service::{
    models::UserRole,
    services::{UserDirectory, UserPatch},
};
use serde_json::json;
use std::time::Duration;

fn refresh_request(cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh-token")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn login_returns_access_token_and_sets_refresh_cookie() {
    let app = TestApp::new().await;
    app.seed_user("citizen@example.com", UserRole::User, None).await;

    let res = app.login_response("Citizen@Example.com", PASSWORD).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["message"], "User logged in successfully");
    assert!(res.body["data"]["accessToken"].as_str().is_some());
    assert_eq!(res.body["data"]["user"]["email"], "citizen@example.com");
    assert_eq!(res.body["data"]["user"]["role"], "user");
    assert!(res.body["data"].get("refreshToken").is_none());

    let set_cookie = res.header("set-cookie").unwrap();
    assert!(set_cookie.starts_with("refreshToken="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn login_failures_map_to_status_codes() {
    let app = TestApp::new().await;
    app.seed_user("citizen@example.com", UserRole::User, None).await;

    let unknown = app.login_response("nobody@example.com", PASSWORD).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.body["success"], false);

    let wrong = app.login_response("citizen@example.com", "not-it").await;
    assert_eq!(wrong.status, StatusCode::FORBIDDEN);
    assert_eq!(wrong.body["message"], "Password do not matched");

    let invalid = app
        .request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "not-an-email", "password": "x" })),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(invalid.body["message"], "Validation error");
}

#[tokio::test]
async fn refresh_cookie_mints_a_new_access_token() {
    let app = TestApp::new().await;
    app.seed_user("citizen@example.com", UserRole::User, None).await;
    let cookie = app
        .login_response("citizen@example.com", PASSWORD)
        .await
        .refresh_cookie()
        .unwrap();

    let res = app.send(refresh_request(&cookie)).await;

    assert_eq!(res.status, StatusCode::OK);
    let access = res.body["data"]["accessToken"].as_str().unwrap();
    let me = app.request("GET", "/api/v1/users/me", Some(access), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["email"], "citizen@example.com");
}

#[tokio::test]
async fn refresh_without_cookie_is_unauthorized() {
    let app = TestApp::new().await;

    let res = app
        .request("POST", "/api/v1/auth/refresh-token", None, None)
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Refresh token is missing");
}

#[tokio::test]
async fn access_token_is_not_accepted_as_refresh_token() {
    let app = TestApp::new().await;
    app.seed_user("citizen@example.com", UserRole::User, None).await;
    let access = app.login("citizen@example.com").await;

    let res = app.send(refresh_request(&format!("refreshToken={}", access))).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_revokes_tokens_issued_before_it() {
    let app = TestApp::new().await;
    app.seed_user("citizen@example.com", UserRole::User, None).await;
    let login = app.login_response("citizen@example.com", PASSWORD).await;
    let access = login.body["data"]["accessToken"].as_str().unwrap().to_string();
    let cookie = login.refresh_cookie().unwrap();

    let res = app
        .request(
            "POST",
            "/api/v1/auth/change-password",
            Some(&access),
            Some(json!({ "oldPassword": PASSWORD, "newPassword": "brand-new-pass" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Password changed successfully");

    let stale = app.request("GET", "/api/v1/users/me", Some(&access), None).await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);

    let refresh = app.send(refresh_request(&cookie)).await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);

    let old = app.login_response("citizen@example.com", PASSWORD).await;
    assert_eq!(old.status, StatusCode::FORBIDDEN);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let fresh = app
        .login_response("citizen@example.com", "brand-new-pass")
        .await;
    assert_eq!(fresh.status, StatusCode::OK);
    let token = fresh.body["data"]["accessToken"].as_str().unwrap();
    let me = app.request("GET", "/api/v1/users/me", Some(token), None).await;
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn change_password_with_wrong_old_password_is_forbidden() {
    let app = TestApp::new().await;
    app.seed_user("citizen@example.com", UserRole::User, None).await;
    let access = app.login("citizen@example.com").await;

    let res = app
        .request(
            "POST",
            "/api/v1/auth/change-password",
            Some(&access),
            Some(json!({ "oldPassword": "wrong-one", "newPassword": "brand-new-pass" })),
        )
        .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn forget_and_reset_password_flow() {
    let app = TestApp::new().await;
    app.seed_user("citizen@example.com", UserRole::User, None).await;

    let res = app
        .request(
            "POST",
            "/api/v1/auth/forget-password",
            None,
            Some(json!({ "email": "citizen@example.com" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Reset link sent to email successfully");

    let mail = app.notifier.last_to("citizen@example.com").unwrap();
    assert!(mail
        .html_body
        .contains("http://localhost:3000/reset-password?id="));
    let token = token_from_mail(&mail.html_body);

    let reset = app
        .request(
            "POST",
            "/api/v1/auth/reset-password",
            Some(&token),
            Some(json!({ "email": "citizen@example.com", "newPassword": "after-reset" })),
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);
    assert_eq!(reset.body["message"], "Password reset successfully");

    let login = app
        .login_response("citizen@example.com", "after-reset")
        .await;
    assert_eq!(login.status, StatusCode::OK);

    let replay = app
        .request(
            "POST",
            "/api/v1/auth/reset-password",
            Some(&token),
            Some(json!({ "email": "citizen@example.com", "newPassword": "second-try" })),
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reset_token_for_one_account_cannot_reset_another() {
    let app = TestApp::new().await;
    app.seed_user("alice@example.com", UserRole::User, None).await;
    app.seed_user("bob@example.com", UserRole::User, None).await;

    app.request(
        "POST",
        "/api/v1/auth/forget-password",
        None,
        Some(json!({ "email": "alice@example.com" })),
    )
    .await;
    let token = token_from_mail(&app.notifier.last_to("alice@example.com").unwrap().html_body);

    let res = app
        .request(
            "POST",
            "/api/v1/auth/reset-password",
            Some(&token),
            Some(json!({ "email": "bob@example.com", "newPassword": "hijacked" })),
        )
        .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let bob = app.login_response("bob@example.com", PASSWORD).await;
    assert_eq!(bob.status, StatusCode::OK);
}

#[tokio::test]
async fn reset_password_requires_a_token() {
    let app = TestApp::new().await;
    app.seed_user("citizen@example.com", UserRole::User, None).await;

    let res = app
        .request(
            "POST",
            "/api/v1/auth/reset-password",
            None,
            Some(json!({ "email": "citizen@example.com", "newPassword": "after-reset" })),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forget_password_for_unknown_email_is_not_found() {
    let app = TestApp::new().await;

    let res = app
        .request(
            "POST",
            "/api/v1/auth/forget-password",
            None,
            Some(json!({ "email": "ghost@example.com" })),
        )
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn two_password_changes_within_a_second_revoke_tokens_issued_between() {
    let app = TestApp::new().await;
    app.seed_user("citizen@example.com", UserRole::User, None).await;
    let first = app.login("citizen@example.com").await;

    let res = app
        .request(
            "POST",
            "/api/v1/auth/change-password",
            Some(&first),
            Some(json!({ "oldPassword": PASSWORD, "newPassword": "second-pass" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let between = app.login_response("citizen@example.com", "second-pass").await;
    assert_eq!(between.status, StatusCode::OK);
    let access = between.body["data"]["accessToken"].as_str().unwrap().to_string();
    let cookie = between.refresh_cookie().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let res = app
        .request(
            "POST",
            "/api/v1/auth/change-password",
            Some(&access),
            Some(json!({ "oldPassword": "second-pass", "newPassword": "third-pass" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let me = app.request("GET", "/api/v1/users/me", Some(&access), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);

    let refresh = app.send(refresh_request(&cookie)).await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_for_soft_deleted_user_is_not_found() {
    let app = TestApp::new().await;
    let user = app
        .seed_user("citizen@example.com", UserRole::User, None)
        .await;
    let cookie = app
        .login_response("citizen@example.com", PASSWORD)
        .await
        .refresh_cookie()
        .unwrap();

    app.users
        .update(&user.id, UserPatch::soft_delete())
        .await
        .unwrap();

    let res = app.send(refresh_request(&cookie)).await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "This user is not found!");
}
