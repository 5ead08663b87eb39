mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn health_reports_store_status() {
    let app = TestApp::new().await;

    let res = app.request("GET", "/health", None, None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
    assert_eq!(res.body["service"], "complaint-service-test");
    assert_eq!(res.body["checks"]["mongodb"], "up");
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::new().await;

    let res = app.request("GET", "/health", None, None).await;

    assert!(res.header("x-request-id").is_some());
    assert_eq!(res.header("x-content-type-options"), Some("nosniff"));
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = TestApp::new().await;

    let res = app.request("GET", "/api/v1/nowhere", None, None).await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
