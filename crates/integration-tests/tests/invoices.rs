//! Invoices: issuing against a lease, payment status and customer scoping.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use warehub_integration_tests::TestApp;
use warehub_portal::services::UploadProfile;
use warehub_portal::services::auth::SESSION_COOKIE;

const BOUNDARY: &str = "warehub-test-boundary";

/// Lease `space` to `client` and return the agreement id.
async fn lease(app: &TestApp, admin: &str, client: i32, space: i64) -> i64 {
    let response = app
        .post_json(
            "/dashboard/agreements",
            Some(admin),
            &json!({
                "clientId": client.to_string(),
                "spaceId": space.to_string(),
                "monthlyRent": "420",
                "deposit": "840",
                "startDate": "2026-01-01",
                "endDate": "2026-12-31",
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
    response.json()["data"]["id"].as_i64().unwrap()
}

fn invoice_body(client: i32, space: i64) -> Value {
    json!({
        "clientId": client.to_string(),
        "spaceId": space.to_string(),
        "amount": "420.00",
        "tax": "84.00",
        "issueDate": "2026-03-01",
        "dueDate": "2026-03-31",
    })
}

async fn issue(app: &TestApp, admin: &str, client: i32, space: i64) -> i64 {
    let response = app
        .post_json("/dashboard/invoices", Some(admin), &invoice_body(client, space))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
    response.json()["data"]["id"].as_i64().unwrap()
}

fn multipart_invoice(token: &str, client: i32, space: i64) -> Request<Body> {
    let client = client.to_string();
    let space = space.to_string();
    let mut body = Vec::new();
    for (name, value) in [
        ("clientId", client.as_str()),
        ("spaceId", space.as_str()),
        ("amount", "420"),
        ("dueDate", "2099-01-31"),
    ] {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"attachment\"; filename=\"march.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"%PDF-1.4 invoice");
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/dashboard/invoices")
        .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_invoice_requires_an_agreement_for_the_space() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, _) = app.customer("dana@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let response = app
        .post_json("/dashboard/invoices", Some(&admin), &invoice_body(client.id.as_i32(), space))
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.json()["errors"]["spaceId"].is_string(), "{}", response.text);

    let listing = app.get("/dashboard/invoices", Some(&admin)).await.json();
    assert_eq!(listing["data"]["total"], 0);
}

#[tokio::test]
async fn test_issued_invoice_totals_and_numbers() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, _) = app.customer("dana@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;
    lease(&app, &admin, client.id.as_i32(), space).await;

    let id = issue(&app, &admin, client.id.as_i32(), space).await;
    let fetched = app.get(&format!("/dashboard/invoices/{id}"), Some(&admin)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    let data = &fetched.json()["data"];
    assert_eq!(data["status"], "PENDING");
    assert_eq!(data["totalAmount"], "504.00");
    assert_eq!(data["spaceCode"], "A-101");
    assert!(data["paidAt"].is_null());
    let number = data["number"].as_str().unwrap();
    assert!(number.starts_with("INV-"), "{number}");
    assert_eq!(number.len(), "INV-YYYYMMDD-XXXXXX".len());
}

#[tokio::test]
async fn test_invoice_attachment_is_uploaded() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, _) = app.customer("dana@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;
    lease(&app, &admin, client.id.as_i32(), space).await;

    let response = app.send(multipart_invoice(&admin, client.id.as_i32(), space)).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
    assert_eq!(
        response.json()["data"]["attachmentUrl"],
        "https://files.test/invoices/march.pdf"
    );

    let uploads = app.files.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, UploadProfile::Invoices);
}

#[tokio::test]
async fn test_paid_at_follows_status() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, _) = app.customer("dana@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;
    lease(&app, &admin, client.id.as_i32(), space).await;
    let id = issue(&app, &admin, client.id.as_i32(), space).await;

    let paid = app
        .post_json(&format!("/dashboard/invoices/{id}/status"), Some(&admin), &json!({"status": "paid"}))
        .await;
    assert_eq!(paid.status, StatusCode::OK, "{}", paid.text);
    assert_eq!(paid.json()["data"]["status"], "PAID");
    assert!(paid.json()["data"]["paidAt"].is_string());

    let reopened = app
        .post_json(&format!("/dashboard/invoices/{id}/status"), Some(&admin), &json!({"status": "PENDING"}))
        .await;
    assert_eq!(reopened.status, StatusCode::OK);
    assert!(reopened.json()["data"]["paidAt"].is_null());

    let unknown = app
        .post_json(&format!("/dashboard/invoices/{id}/status"), Some(&admin), &json!({"status": "REFUNDED"}))
        .await;
    assert_eq!(unknown.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(unknown.json()["errors"]["status"].is_string());
}

#[tokio::test]
async fn test_customers_only_see_their_own_invoices() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (dana, dana_token) = app.customer("dana@example.com").await;
    let (_, eli_token) = app.customer("eli@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;
    lease(&app, &admin, dana.id.as_i32(), space).await;
    let id = issue(&app, &admin, dana.id.as_i32(), space).await;

    let mine = app.get("/dashboard/invoices", Some(&dana_token)).await.json();
    assert_eq!(mine["data"]["total"], 1);
    assert_eq!(mine["data"]["items"][0]["id"], id);

    let theirs = app.get("/dashboard/invoices", Some(&eli_token)).await.json();
    assert_eq!(theirs["data"]["total"], 0);
    let hidden = app.get(&format!("/dashboard/invoices/{id}"), Some(&eli_token)).await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);

    let forged = app
        .post_json("/dashboard/invoices", Some(&dana_token), &invoice_body(dana.id.as_i32(), space))
        .await;
    assert_eq!(forged.status, StatusCode::FORBIDDEN);
    assert_eq!(forged.json()["error"], "Unauthorized");
}

#[tokio::test]
async fn test_renamed_space_shows_in_cached_listings() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, customer) = app.customer("dana@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;
    lease(&app, &admin, client.id.as_i32(), space).await;
    issue(&app, &admin, client.id.as_i32(), space).await;
    let ticket = app
        .post_form(
            "/dashboard/support",
            Some(&customer),
            &format!("subject=Door&message=Sticks&spaceId={space}"),
        )
        .await;
    assert_eq!(ticket.status, StatusCode::CREATED, "{}", ticket.text);

    let invoices = app.get("/dashboard/invoices", Some(&admin)).await.json();
    assert_eq!(invoices["data"]["items"][0]["spaceCode"], "A-101");
    let tickets = app.get("/dashboard/support", Some(&admin)).await.json();
    assert_eq!(tickets["data"]["items"][0]["spaceCode"], "A-101");

    let renamed = app
        .post_json(
            &format!("/dashboard/spaces/{space}"),
            Some(&admin),
            &json!({
                "warehouseId": warehouse.to_string(),
                "code": "B-202",
                "name": "Pallet bay B-202",
                "spaceType": "Pallet bay",
                "size": "250",
                "rate": "420.00",
            }),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK, "{}", renamed.text);
    assert_eq!(renamed.json()["data"]["status"], "OCCUPIED");

    let invoices = app.get("/dashboard/invoices", Some(&admin)).await.json();
    assert_eq!(invoices["data"]["items"][0]["spaceCode"], "B-202");
    let tickets = app.get("/dashboard/support", Some(&admin)).await.json();
    assert_eq!(tickets["data"]["items"][0]["spaceCode"], "B-202");
    let agreements = app.get("/dashboard/agreements", Some(&admin)).await.json();
    assert_eq!(agreements["data"]["items"][0]["spaceCode"], "B-202");
}
