mod common;

use axum::http::StatusCode;
use common::{complaint_body, TestApp};
use complaint_service::models::{Department, UserRole};
use serde_json::json;

/// Returns (admin token, ids of the submitted complaints).
async fn seeded(app: &TestApp) -> (String, Vec<String>) {
    app.seed_user("citizen@example.com", UserRole::User, None).await;
    app.seed_user("admin@example.com", UserRole::Admin, Some(Department::Drainage))
        .await;
    let citizen = app.login("citizen@example.com").await;

    let mut ids = Vec::new();
    for (title, department, thana) in [
        ("Overflowing drain", "drainage", "Dhanmondi"),
        ("Blocked drain", "drainage", "Dhanmondi"),
        ("Clinic closed", "health", "Mirpur"),
    ] {
        let mut body = complaint_body(title, department, "public");
        body["thana"] = json!(thana);
        let res = app
            .request("POST", "/api/v1/complaints", Some(&citizen), Some(body))
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        ids.push(res.body["data"]["_id"].as_str().unwrap().to_string());
    }

    (app.login("admin@example.com").await, ids)
}

#[tokio::test]
async fn batch_analysis_falls_back_without_a_model() {
    let app = TestApp::new().await;
    let (admin, ids) = seeded(&app).await;

    let res = app
        .request(
            "POST",
            "/api/v1/ai/analyze-batch",
            Some(&admin),
            Some(json!({ "complaintIds": ids })),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Complaints analyzed successfully");
    let data = &res.body["data"];
    assert_eq!(data["totalComplaints"], 3);
    assert_eq!(data["commonIssues"][0]["category"], "drainage");
    assert_eq!(data["commonIssues"][0]["percentage"], 100);
    assert_eq!(data["departmentDistribution"][0]["department"], "drainage");
    assert_eq!(data["departmentDistribution"][0]["count"], 2);
    assert_eq!(data["departmentDistribution"][0]["percentage"], 67);
    assert_eq!(data["priorityDistribution"][0]["priority"], "high");

    let summary = &data["aiSummary"];
    assert!(summary["overview"]
        .as_str()
        .unwrap()
        .contains("using fallback analysis"));
    assert_eq!(summary["recommendedActions"].as_array().unwrap().len(), 5);
    assert_eq!(summary["urgentIssues"].as_array().unwrap().len(), 3);
    assert!(data["analysisDate"].as_str().is_some());
}

#[tokio::test]
async fn batch_analysis_narrows_by_location() {
    let app = TestApp::new().await;
    let (admin, ids) = seeded(&app).await;

    let res = app
        .request(
            "POST",
            "/api/v1/ai/analyze-batch",
            Some(&admin),
            Some(json!({ "complaintIds": ids, "location": { "thana": "Mirpur" } })),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["totalComplaints"], 1);
    assert_eq!(res.body["data"]["location"]["thana"], "Mirpur");
}

#[tokio::test]
async fn batch_analysis_rejects_bad_id_lists() {
    let app = TestApp::new().await;
    let (admin, _) = seeded(&app).await;

    let empty = app
        .request(
            "POST",
            "/api/v1/ai/analyze-batch",
            Some(&admin),
            Some(json!({ "complaintIds": [] })),
        )
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.body["message"], "At least one complaint ID is required");

    let too_many: Vec<String> = (0..101).map(|i| format!("id-{}", i)).collect();
    let oversized = app
        .request(
            "POST",
            "/api/v1/ai/analyze-batch",
            Some(&admin),
            Some(json!({ "complaintIds": too_many })),
        )
        .await;
    assert_eq!(oversized.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        oversized.body["message"],
        "Maximum 100 complaints can be analyzed at once"
    );

    let unknown = app
        .request(
            "POST",
            "/api/v1/ai/analyze-batch",
            Some(&admin),
            Some(json!({ "complaintIds": ["missing"] })),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn location_analysis_requires_a_matching_location() {
    let app = TestApp::new().await;
    let (admin, _) = seeded(&app).await;

    let res = app
        .request(
            "POST",
            "/api/v1/ai/analyze-location",
            Some(&admin),
            Some(json!({ "location": { "district": "Dhaka" } })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.body["message"],
        "Location-based complaints analyzed successfully"
    );
    assert_eq!(res.body["data"]["totalComplaints"], 3);

    let blank = app
        .request(
            "POST",
            "/api/v1/ai/analyze-location",
            Some(&admin),
            Some(json!({ "location": { "thana": "  " } })),
        )
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let nowhere = app
        .request(
            "POST",
            "/api/v1/ai/analyze-location",
            Some(&admin),
            Some(json!({ "location": { "district": "Sylhet" } })),
        )
        .await;
    assert_eq!(nowhere.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analysis_is_closed_to_citizens() {
    let app = TestApp::new().await;
    seeded(&app).await;
    let citizen = app.login("citizen@example.com").await;

    let res = app
        .request(
            "POST",
            "/api/v1/ai/analyze-location",
            Some(&citizen),
            Some(json!({ "location": { "district": "Dhaka" } })),
        )
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
