//! Public space requests: reservation, admin notification and review.

use axum::http::StatusCode;
use serde_json::json;
use warehub_integration_tests::{ADMIN_INBOX, RecordingMailer, TestApp};
use warehub_portal::services::View;

#[tokio::test]
async fn test_request_reserves_space_and_notifies_admin() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let catalog = app.get("/api/spaces/available", None).await.json();
    assert_eq!(catalog["data"]["total"], 1);
    let before = app.state.views().invalidation_count(View::Spaces);

    let response = app
        .post_json(
            "/api/space-requests",
            None,
            &json!({"spaceId": space.to_string(), "name": "Acme", "email": "a@b.com"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
    assert_eq!(response.json()["data"]["status"], "PENDING");

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to.as_str(), ADMIN_INBOX);
    assert!(sent[0].text.contains("Acme"));
    assert!(app.state.views().invalidation_count(View::Spaces) > before);

    let catalog = app.get("/api/spaces/available", None).await.json();
    assert_eq!(catalog["data"]["total"], 0);
}

#[tokio::test]
async fn test_failed_notification_releases_space() {
    let app = TestApp::with_mailer(RecordingMailer::failing());
    let admin = app.admin().await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let response = app
        .post_form(
            "/api/space-requests",
            None,
            &format!("spaceId={space}&name=Acme&email=a%40b.com"),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.json()["success"], false);

    let fetched = app.get(&format!("/dashboard/spaces/{space}"), Some(&admin)).await.json();
    assert_eq!(fetched["data"]["status"], "AVAILABLE");
    let requests = app.get("/dashboard/space-requests", Some(&admin)).await.json();
    assert_eq!(requests["data"]["total"], 0);
}

#[tokio::test]
async fn test_request_for_reserved_space_is_refused() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;
    let body = json!({"spaceId": space.to_string(), "name": "Acme", "email": "a@b.com"});

    assert_eq!(app.post_json("/api/space-requests", None, &body).await.status, StatusCode::CREATED);
    let second = app.post_json("/api/space-requests", None, &body).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_approval_turns_request_into_agreement() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, _) = app.customer("acme@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let submitted = app
        .post_json(
            "/api/space-requests",
            None,
            &json!({"spaceId": space.to_string(), "name": "Acme", "email": "acme@example.com"}),
        )
        .await
        .json();
    let request = submitted["data"]["id"].as_i64().unwrap();

    let response = app
        .post_json(
            &format!("/dashboard/space-requests/{request}/approve"),
            Some(&admin),
            &json!({
                "clientId": client.id.to_string(),
                "monthlyRent": "420",
                "startDate": "2026-02-01",
                "endDate": "2027-01-31",
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text);
    let data = &response.json()["data"];
    assert_eq!(data["request"]["status"], "APPROVED");
    assert_eq!(data["agreement"]["spaceId"], space);

    let fetched = app.get(&format!("/dashboard/spaces/{space}"), Some(&admin)).await.json();
    assert_eq!(fetched["data"]["status"], "OCCUPIED");
}

#[tokio::test]
async fn test_rejection_releases_space() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let submitted = app
        .post_json(
            "/api/space-requests",
            None,
            &json!({"spaceId": space.to_string(), "name": "Acme", "email": "a@b.com"}),
        )
        .await
        .json();
    let request = submitted["data"]["id"].as_i64().unwrap();

    let response = app
        .post_json(&format!("/dashboard/space-requests/{request}/reject"), Some(&admin), &json!({}))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text);
    assert_eq!(response.json()["data"]["status"], "REJECTED");

    let catalog = app.get("/api/spaces/available", None).await.json();
    assert_eq!(catalog["data"]["total"], 1);
}

#[tokio::test]
async fn test_approval_cannot_start_an_inactive_agreement() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, _) = app.customer("acme@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let submitted = app
        .post_json(
            "/api/space-requests",
            None,
            &json!({"spaceId": space.to_string(), "name": "Acme", "email": "acme@example.com"}),
        )
        .await
        .json();
    let request = submitted["data"]["id"].as_i64().unwrap();

    let response = app
        .post_json(
            &format!("/dashboard/space-requests/{request}/approve"),
            Some(&admin),
            &json!({
                "clientId": client.id.to_string(),
                "monthlyRent": "420",
                "startDate": "2026-02-01",
                "endDate": "2027-01-31",
                "status": "INACTIVE",
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.json()["errors"]["status"].is_string());

    let fetched = app.get(&format!("/dashboard/space-requests/{request}"), Some(&admin)).await.json();
    assert_eq!(fetched["data"]["status"], "PENDING");
    let agreements = app.get("/dashboard/agreements", Some(&admin)).await.json();
    assert_eq!(agreements["data"]["total"], 0);

    // The request is still reviewable and releases the space on rejection.
    let rejected = app
        .post_json(&format!("/dashboard/space-requests/{request}/reject"), Some(&admin), &json!({}))
        .await;
    assert_eq!(rejected.status, StatusCode::OK, "{}", rejected.text);
    let space_after = app.get(&format!("/dashboard/spaces/{space}"), Some(&admin)).await.json();
    assert_eq!(space_after["data"]["status"], "AVAILABLE");
}
