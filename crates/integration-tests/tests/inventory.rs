//! Warehouse, space and agreement flows through the action envelope.

use axum::http::StatusCode;
use serde_json::{Value, json};
use warehub_integration_tests::{TestApp, TestResponse};

#[tokio::test]
async fn test_negative_capacity_is_rejected_without_a_write() {
    let app = TestApp::new();
    let admin = app.admin().await;

    let response = app
        .post_form(
            "/dashboard/warehouses",
            Some(&admin),
            "code=wh-1&name=North&location=Leeds&storageType=AMBIENT&capacity=-1",
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json();
    assert_eq!(body["success"], false);
    assert!(body["errors"]["capacity"].is_string(), "{body}");

    let listing = app.get("/dashboard/warehouses", Some(&admin)).await.json();
    assert_eq!(listing["data"]["total"], 0);
}

#[tokio::test]
async fn test_created_warehouse_reads_back_coerced() {
    let app = TestApp::new();
    let admin = app.admin().await;

    let response = app
        .post_form(
            "/dashboard/warehouses",
            Some(&admin),
            "code=+wh-north+&name=Northgate&location=Leeds&storageType=cold-storage&capacity=+4000+",
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
    let id = response.json()["data"]["id"].as_i64().unwrap();

    let fetched = app.get(&format!("/dashboard/warehouses/{id}"), Some(&admin)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    let data = &fetched.json()["data"];
    assert_eq!(data["code"], "WH-NORTH");
    assert_eq!(data["storageType"], "COLD_STORAGE");
    assert_eq!(data["capacity"], 4000);
    assert_eq!(data["spaceCount"], 0);
}

#[tokio::test]
async fn test_duplicate_space_code_is_a_field_error() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let response = app
        .post_json(
            "/dashboard/spaces",
            Some(&admin),
            &json!({
                "warehouseId": warehouse.to_string(),
                "code": "a-101",
                "name": "Another bay",
                "spaceType": "Pallet bay",
                "size": "100",
                "rate": "200",
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.json()["errors"]["code"].is_string());
}

#[tokio::test]
async fn test_agreement_on_unavailable_space_changes_nothing() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, _) = app.customer("dana@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "MAINTENANCE").await;

    let response = app
        .post_json(
            "/dashboard/agreements",
            Some(&admin),
            &json!({
                "clientId": client.id.to_string(),
                "spaceId": space.to_string(),
                "monthlyRent": "420",
                "deposit": "840",
                "startDate": "2026-01-01",
                "endDate": "2026-12-31",
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT, "{}", response.text);
    assert_eq!(response.json()["error"], "Space is not available");

    let agreements = app.get("/dashboard/agreements", Some(&admin)).await.json();
    assert_eq!(agreements["data"]["total"], 0);
    let fetched = app.get(&format!("/dashboard/spaces/{space}"), Some(&admin)).await.json();
    assert_eq!(fetched["data"]["status"], "MAINTENANCE");
}

#[tokio::test]
async fn test_agreement_occupies_space_and_shows_for_customer() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, customer) = app.customer("dana@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let response = app
        .post_json(
            "/dashboard/agreements",
            Some(&admin),
            &json!({
                "clientId": client.id.to_string(),
                "spaceId": space.to_string(),
                "monthlyRent": "420.00",
                "deposit": "0",
                "startDate": "2026-01-01",
                "endDate": "2026-12-31",
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);

    let fetched = app.get(&format!("/dashboard/spaces/{space}"), Some(&admin)).await.json();
    assert_eq!(fetched["data"]["status"], "OCCUPIED");

    let mine = app.get("/dashboard/my-spaces", Some(&customer)).await.json();
    assert_eq!(mine["data"][0]["code"], "A-101");

    let catalog = app.get("/api/spaces/available", None).await.json();
    assert_eq!(catalog["data"]["total"], 0);
}

#[tokio::test]
async fn test_customer_cannot_read_another_customers_agreement() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (owner, _) = app.customer("owner@example.com").await;
    let (_, other) = app.customer("other@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let created = app
        .post_json(
            "/dashboard/agreements",
            Some(&admin),
            &json!({
                "clientId": owner.id.to_string(),
                "spaceId": space.to_string(),
                "monthlyRent": "420",
                "startDate": "2026-01-01",
                "endDate": "2026-06-30",
            }),
        )
        .await
        .json();
    let id = created["data"]["id"].as_i64().unwrap();

    let response = app.get(&format!("/dashboard/my-agreements/{id}"), Some(&other)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

async fn lease(app: &TestApp, admin: &str, client: &str, space: i64) -> TestResponse {
    app.post_json(
        "/dashboard/agreements",
        Some(admin),
        &json!({
            "clientId": client,
            "spaceId": space.to_string(),
            "monthlyRent": "420",
            "startDate": "2026-01-01",
            "endDate": "2026-12-31",
        }),
    )
    .await
}

fn agreement_changes(status: &str) -> Value {
    json!({
        "monthlyRent": "450",
        "startDate": "2026-01-01",
        "endDate": "2026-12-31",
        "status": status,
    })
}

#[tokio::test]
async fn test_inactive_agreement_frees_space_until_reactivated() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (first, _) = app.customer("first@example.com").await;
    let (second, _) = app.customer("second@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let created = lease(&app, &admin, &first.id.to_string(), space).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text);
    let id = created.json()["data"]["id"].as_i64().unwrap();

    let ended = app
        .post_json(&format!("/dashboard/agreements/{id}"), Some(&admin), &agreement_changes("inactive"))
        .await;
    assert_eq!(ended.status, StatusCode::OK, "{}", ended.text);
    assert_eq!(ended.json()["data"]["status"], "INACTIVE");
    assert_eq!(ended.json()["data"]["monthlyRent"], "450");
    let fetched = app.get(&format!("/dashboard/spaces/{space}"), Some(&admin)).await.json();
    assert_eq!(fetched["data"]["status"], "AVAILABLE");

    let taken = lease(&app, &admin, &second.id.to_string(), space).await;
    assert_eq!(taken.status, StatusCode::CREATED, "{}", taken.text);

    let revived = app
        .post_json(&format!("/dashboard/agreements/{id}"), Some(&admin), &agreement_changes("ACTIVE"))
        .await;
    assert_eq!(revived.status, StatusCode::CONFLICT, "{}", revived.text);
    let agreement = app.get(&format!("/dashboard/agreements/{id}"), Some(&admin)).await.json();
    assert_eq!(agreement["data"]["status"], "INACTIVE");
}

#[tokio::test]
async fn test_inactive_client_cannot_lease() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, _) = app.customer("dana@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;

    let deactivated = app
        .post_json(
            &format!("/dashboard/clients/{}/status", client.id),
            Some(&admin),
            &json!({"status": "INACTIVE"}),
        )
        .await;
    assert_eq!(deactivated.status, StatusCode::OK, "{}", deactivated.text);
    assert_eq!(deactivated.json()["data"]["status"], "INACTIVE");

    let refused = lease(&app, &admin, &client.id.to_string(), space).await;
    assert_eq!(refused.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(refused.json()["errors"]["clientId"].is_string());
    let fetched = app.get(&format!("/dashboard/spaces/{space}"), Some(&admin)).await.json();
    assert_eq!(fetched["data"]["status"], "AVAILABLE");
}

#[tokio::test]
async fn test_client_with_agreement_cannot_be_deleted() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, _) = app.customer("dana@example.com").await;
    let (idle, _) = app.customer("idle@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;
    let created = lease(&app, &admin, &client.id.to_string(), space).await;
    assert_eq!(created.status, StatusCode::CREATED);

    let refused = app
        .post_json(&format!("/dashboard/clients/{}/delete", client.id), Some(&admin), &json!({}))
        .await;
    assert_eq!(refused.status, StatusCode::CONFLICT, "{}", refused.text);
    let still_there = app.get(&format!("/dashboard/clients/{}", client.id), Some(&admin)).await;
    assert_eq!(still_there.status, StatusCode::OK);

    let deleted = app
        .post_json(&format!("/dashboard/clients/{}/delete", idle.id), Some(&admin), &json!({}))
        .await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.text);
    let gone = app.get(&format!("/dashboard/clients/{}", idle.id), Some(&admin)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_warehouse_with_occupied_space_cannot_be_deleted() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, _) = app.customer("dana@example.com").await;
    let busy = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, busy, "A-101", "AVAILABLE").await;
    let created = lease(&app, &admin, &client.id.to_string(), space).await;
    assert_eq!(created.status, StatusCode::CREATED);

    let refused = app
        .post_json(&format!("/dashboard/warehouses/{busy}/delete"), Some(&admin), &json!({}))
        .await;
    assert_eq!(refused.status, StatusCode::CONFLICT, "{}", refused.text);
    let fetched = app.get(&format!("/dashboard/spaces/{space}"), Some(&admin)).await;
    assert_eq!(fetched.status, StatusCode::OK);

    let empty = app.warehouse(&admin, "WH-2").await;
    app.space(&admin, empty, "B-1", "AVAILABLE").await;
    let deleted = app
        .post_json(&format!("/dashboard/warehouses/{empty}/delete"), Some(&admin), &json!({}))
        .await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.text);
    let listing = app.get("/dashboard/warehouses", Some(&admin)).await.json();
    assert_eq!(listing["data"]["total"], 1);
}

#[tokio::test]
async fn test_analytics_follow_inventory_and_payments() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (client, customer) = app.customer("dana@example.com").await;
    let warehouse = app.warehouse(&admin, "WH-1").await;
    let space = app.space(&admin, warehouse, "A-101", "AVAILABLE").await;
    app.space(&admin, warehouse, "A-102", "AVAILABLE").await;

    // Warm the cache before anything is leased.
    let before = app.get("/api/analytics/overview", Some(&admin)).await.json();
    assert_eq!(before["data"]["availableSpaces"], 2);
    assert_eq!(before["data"]["activeAgreements"], 0);

    let created = lease(&app, &admin, &client.id.to_string(), space).await;
    assert_eq!(created.status, StatusCode::CREATED);

    let overview = app.get("/api/analytics/overview", Some(&admin)).await.json();
    let data = &overview["data"];
    assert_eq!(data["warehouses"], 1);
    assert_eq!(data["spaces"], 2);
    assert_eq!(data["availableSpaces"], 1);
    assert_eq!(data["clients"], 1);
    assert_eq!(data["activeAgreements"], 1);

    let occupancy = app.get("/api/analytics/occupancy", Some(&admin)).await.json();
    assert_eq!(occupancy["data"][0]["warehouseName"], "Northgate Logistics Park");
    assert_eq!(occupancy["data"][0]["totalSpaces"], 2);
    assert_eq!(occupancy["data"][0]["occupiedSpaces"], 1);
    assert_eq!(occupancy["data"][0]["occupancyRate"], 0.5);

    let types = app.get("/api/analytics/business-types", Some(&admin)).await.json();
    assert_eq!(types["data"], json!([{"businessType": "Unspecified", "clients": 1}]));

    let revenue = app.get("/api/analytics/revenue?months=3", Some(&admin)).await.json();
    assert_eq!(revenue["data"], json!([]));

    let invoice = app
        .post_json(
            "/dashboard/invoices",
            Some(&admin),
            &json!({
                "clientId": client.id.to_string(),
                "spaceId": space.to_string(),
                "amount": "420",
                "tax": "80",
                "dueDate": "2099-12-31",
                "status": "PAID",
            }),
        )
        .await;
    assert_eq!(invoice.status, StatusCode::CREATED, "{}", invoice.text);

    let revenue = app.get("/api/analytics/revenue?months=3", Some(&admin)).await.json();
    let months = revenue["data"].as_array().unwrap();
    assert_eq!(months.len(), 1);
    assert_eq!(months[0]["total"], "500");
    assert_eq!(months[0]["invoiceCount"], 1);

    let denied = app.get("/api/analytics/overview", Some(&customer)).await;
    assert_eq!(denied.status, StatusCode::SEE_OTHER);
    assert_eq!(denied.location(), Some("/dashboard/my-spaces"));
}
