mod common;

use axum::http::StatusCode;
use common::{TestApp, PASSWORD};
use complaint_service::models::UserRole;
use serde_json::{json, Value};

fn signup_body(email: &str) -> Value {
    json!({
        "firstName": "Rahim",
        "lastName": "Uddin",
        "email": email,
        "password": "signup-pass",
        "phone": "01711111111",
        "postCode": "1207",
        "thana": "Dhanmondi",
        "district": "Dhaka",
        "division": "Dhaka",
        "address": "House 7, Road 3, Dhanmondi",
        "role": "superAdmin"
    })
}

#[tokio::test]
async fn signup_creates_a_plain_user_and_sends_welcome_mail() {
    let app = TestApp::new().await;

    let res = app
        .request(
            "POST",
            "/api/v1/users/signup",
            None,
            Some(signup_body("Rahim@Example.com")),
        )
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["message"], "User created successfully");
    assert_eq!(res.body["data"]["email"], "rahim@example.com");
    assert_eq!(res.body["data"]["role"], "user");
    assert!(res.body["data"].get("password").is_none());
    assert!(app.notifier.last_to("rahim@example.com").is_some());

    let login = app
        .login_response("rahim@example.com", "signup-pass")
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let app = TestApp::new().await;
    app.seed_user("rahim@example.com", UserRole::User, None).await;

    let res = app
        .request(
            "POST",
            "/api/v1/users/signup",
            None,
            Some(signup_body("rahim@example.com")),
        )
        .await;

    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn signup_rejects_short_password() {
    let app = TestApp::new().await;
    let mut body = signup_body("rahim@example.com");
    body["password"] = json!("123");

    let res = app
        .request("POST", "/api/v1/users/signup", None, Some(body))
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.users.all().await.is_empty());
}

#[tokio::test]
async fn update_me_changes_profile_but_not_role() {
    let app = TestApp::new().await;
    app.seed_user("citizen@example.com", UserRole::User, None).await;
    let token = app.login("citizen@example.com").await;

    let res = app
        .request(
            "PATCH",
            "/api/v1/users/me",
            Some(&token),
            Some(json!({ "firstName": "Karim", "role": "superAdmin" })),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["firstName"], "Karim");
    assert_eq!(res.body["data"]["role"], "user");

    let empty = app
        .request("PATCH", "/api/v1/users/me", Some(&token), Some(json!({})))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn super_admin_lists_users_with_pagination_meta() {
    let app = TestApp::new().await;
    app.seed_user("super@example.com", UserRole::SuperAdmin, None)
        .await;
    for i in 0..3 {
        app.seed_user(&format!("citizen{}@example.com", i), UserRole::User, None)
            .await;
    }
    let token = app.login("super@example.com").await;

    let res = app
        .request(
            "GET",
            "/api/v1/users?role=user&limit=2&page=1",
            Some(&token),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Users fetched successfully");
    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|u| u["role"] == "user"));
    assert!(data.iter().all(|u| u.get("password").is_none()));
    assert_eq!(res.body["meta"]["total"], 3);
    assert_eq!(res.body["meta"]["totalPages"], 2);
    assert_eq!(res.body["meta"]["hasNextPage"], true);
    assert_eq!(res.body["meta"]["hasPrevPage"], false);
}

#[tokio::test]
async fn super_admin_searches_users() {
    let app = TestApp::new().await;
    app.seed_user("super@example.com", UserRole::SuperAdmin, None)
        .await;
    app.seed_user("karim@example.com", UserRole::User, None).await;
    app.seed_user("rahim@example.com", UserRole::User, None).await;
    let token = app.login("super@example.com").await;

    let res = app
        .request("GET", "/api/v1/users?searchTerm=karim", Some(&token), None)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["email"], "karim@example.com");
}

#[tokio::test]
async fn super_admin_updates_and_soft_deletes_users() {
    let app = TestApp::new().await;
    app.seed_user("super@example.com", UserRole::SuperAdmin, None)
        .await;
    let target = app
        .seed_user("citizen@example.com", UserRole::User, None)
        .await;
    let token = app.login("super@example.com").await;

    let promoted = app
        .request(
            "PATCH",
            &format!("/api/v1/users/{}", target.id),
            Some(&token),
            Some(json!({ "role": "admin", "department": "health" })),
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["data"]["role"], "admin");
    assert_eq!(promoted.body["data"]["department"], "health");

    let deleted = app
        .request(
            "DELETE",
            &format!("/api/v1/users/{}", target.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["message"], "User deleted successfully");

    let fetched = app
        .request(
            "GET",
            &format!("/api/v1/users/{}", target.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(fetched.status, StatusCode::NOT_FOUND);

    let stored = app.users.all().await;
    assert!(stored.iter().any(|u| u.id == target.id && u.is_deleted));

    let login = app.login_response("citizen@example.com", PASSWORD).await;
    assert_eq!(login.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn banned_user_cannot_log_in() {
    let app = TestApp::new().await;
    app.seed_user("super@example.com", UserRole::SuperAdmin, None)
        .await;
    let target = app
        .seed_user("citizen@example.com", UserRole::User, None)
        .await;
    let token = app.login("super@example.com").await;

    let res = app
        .request(
            "PATCH",
            &format!("/api/v1/users/{}", target.id),
            Some(&token),
            Some(json!({ "isBanned": true })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let login = app.login_response("citizen@example.com", PASSWORD).await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);
}
