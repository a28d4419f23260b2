//! Support tickets: submission with attachments, triage and resolution.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::json;
use warehub_integration_tests::TestApp;
use warehub_portal::services::UploadProfile;
use warehub_portal::services::auth::SESSION_COOKIE;

const BOUNDARY: &str = "warehub-test-boundary";

fn multipart_ticket(token: &str, subject: &str, attachment: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in [("subject", subject), ("message", "The dock door sticks."), ("category", "MAINTENANCE")] {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"attachment\"; filename=\"door.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(attachment);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/dashboard/support")
        .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn open_ticket(app: &TestApp, customer: &str) -> i64 {
    let response = app
        .post_form(
            "/dashboard/support",
            Some(customer),
            "subject=Lights+out&message=Bay+lights+are+off&priority=HIGH",
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
    response.json()["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_ticket_defaults_and_ownership() {
    let app = TestApp::new();
    let (customer, token) = app.customer("dana@example.com").await;

    let id = open_ticket(&app, &token).await;
    let ticket = app.get(&format!("/dashboard/support/{id}"), Some(&token)).await.json();
    assert_eq!(ticket["data"]["clientId"], customer.id.as_i32());
    assert_eq!(ticket["data"]["status"], "OPEN");
    assert_eq!(ticket["data"]["category"], "GENERAL");
    assert_eq!(ticket["data"]["priority"], "HIGH");

    let (_, other) = app.customer("other@example.com").await;
    let hidden = app.get(&format!("/dashboard/support/{id}"), Some(&other)).await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);
    let listing = app.get("/dashboard/support", Some(&other)).await.json();
    assert_eq!(listing["data"]["total"], 0);
}

#[tokio::test]
async fn test_attachment_is_uploaded_with_ticket() {
    let app = TestApp::new();
    let (_, token) = app.customer("dana@example.com").await;

    let response = app.send(multipart_ticket(&token, "Door", b"\xFF\xD8\xFFjpeg")).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
    assert_eq!(
        response.json()["data"]["attachmentUrl"],
        "https://files.test/support/door.jpg"
    );

    let uploads = app.files.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, UploadProfile::Support);
    assert_eq!(uploads[0].1.content_type, "image/jpeg");
}

#[tokio::test]
async fn test_ticket_for_unleased_space_is_refused() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (_, token) = app.customer("dana@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let response = app
        .post_json(
            "/dashboard/support",
            Some(&token),
            &json!({"subject": "Leak", "message": "Water on the floor", "spaceId": space.to_string()}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.json()["errors"]["spaceId"].is_string());
}

#[tokio::test]
async fn test_resolving_twice_is_idempotent() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (_, token) = app.customer("dana@example.com").await;
    let id = open_ticket(&app, &token).await;
    let path = format!("/api/support/{id}/resolve");

    let first = app
        .post_json(&path, Some(&admin), &json!({"resolution": "Replaced the fuse"}))
        .await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.text);
    let resolved_at = first.json()["data"]["resolvedAt"].clone();

    let second = app.post_json(&path, Some(&admin), &json!({})).await;
    assert_eq!(second.status, StatusCode::OK);
    let data = &second.json()["data"];
    assert_eq!(data["status"], "RESOLVED");
    assert_eq!(data["resolution"], "Replaced the fuse");
    assert_eq!(data["resolvedAt"], resolved_at);
}

#[tokio::test]
async fn test_customer_cannot_resolve_or_delete_others_tickets() {
    let app = TestApp::new();
    let (_, owner) = app.customer("owner@example.com").await;
    let (_, other) = app.customer("other@example.com").await;
    let id = open_ticket(&app, &owner).await;

    let resolve = app
        .post_json(&format!("/api/support/{id}/resolve"), Some(&owner), &json!({}))
        .await;
    assert_eq!(resolve.status, StatusCode::FORBIDDEN);
    assert_eq!(resolve.json()["error"], "Unauthorized");

    let delete = app
        .post_json(&format!("/dashboard/support/{id}/delete"), Some(&other), &json!({}))
        .await;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);

    let delete = app
        .post_json(&format!("/dashboard/support/{id}/delete"), Some(&owner), &json!({}))
        .await;
    assert_eq!(delete.status, StatusCode::OK);
}
