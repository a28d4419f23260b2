//! Registration, approval and login.

use axum::http::{StatusCode, header};
use serde_json::json;
use warehub_integration_tests::{PASSWORD, TestApp};

#[tokio::test]
async fn test_registered_customer_waits_for_approval() {
    let app = TestApp::new();
    let admin = app.admin().await;

    let registered = app
        .post_json(
            "/api/auth/register",
            None,
            &json!({
                "name": "Dana Reyes",
                "email": "Dana@Example.com",
                "password": PASSWORD,
                "companyName": "Reyes Freight",
            }),
        )
        .await;
    assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.text);
    let user = registered.json()["data"].clone();
    assert_eq!(user["status"], "PENDING");
    assert_eq!(user["email"], "dana@example.com");

    let credentials = json!({"email": "dana@example.com", "password": PASSWORD});
    let refused = app.post_json("/api/auth/login", None, &credentials).await;
    assert_eq!(refused.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(refused.json()["errors"]["email"].is_string());

    let id = user["id"].as_i64().unwrap();
    let approved = app
        .post_json(&format!("/dashboard/clients/{id}/status"), Some(&admin), &json!({"status": "ACTIVE"}))
        .await;
    assert_eq!(approved.status, StatusCode::OK, "{}", approved.text);

    let login = app.post_json("/api/auth/login", None, &credentials).await;
    assert_eq!(login.status, StatusCode::OK, "{}", login.text);
    assert_eq!(login.json()["data"]["landingPath"], "/dashboard/my-spaces");
    let cookie = login.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("warehub_session="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_browser_login_redirects() {
    let app = TestApp::new();
    app.account(warehub_core::Role::Admin, "ops@warehub.test").await;

    let ok = app
        .post_form(
            "/api/auth/login",
            None,
            &format!("email=ops%40warehub.test&password={PASSWORD}"),
        )
        .await;
    assert_eq!(ok.status, StatusCode::SEE_OTHER);
    assert_eq!(ok.location(), Some("/dashboard"));
    assert!(ok.headers.contains_key(header::SET_COOKIE));

    let bad = app
        .post_form("/api/auth/login", None, "email=ops%40warehub.test&password=wrong-password")
        .await;
    assert_eq!(bad.status, StatusCode::SEE_OTHER);
    assert_eq!(bad.location(), Some("/login?error=credentials"));
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = TestApp::new();

    let response = app.post_form("/api/auth/logout", None, "").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let cookie = response.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_only_admins_create_admins() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let body = json!({"name": "Second Admin", "email": "second@warehub.test", "password": PASSWORD});

    let created = app.post_json("/api/admin/users", Some(&admin), &body).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.text);
    assert_eq!(created.json()["data"]["role"], "ADMIN");

    let missing_password = app
        .post_json(
            "/api/admin/users",
            Some(&admin),
            &json!({"name": "Third", "email": "third@warehub.test"}),
        )
        .await;
    assert_eq!(missing_password.status, StatusCode::UNPROCESSABLE_ENTITY);
}
