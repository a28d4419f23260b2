//! Test harness for Warehub integration tests.
//!
//! [`TestApp`] drives the real portal router in-process with the in-memory
//! store, a mailer that records what it sends and a file host that hands
//! back predictable URLs. No database or network is needed:
//!
//! ```bash
//! cargo test -p warehub-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

use warehub_core::{Email, Role, UserStatus};
use warehub_portal::config::{PortalConfig, StoreBackend};
use warehub_portal::db::memory::MemoryDatabase;
use warehub_portal::models::{BusinessProfile, User};
use warehub_portal::services::auth::{NewAccount, SESSION_COOKIE};
use warehub_portal::services::{
    AuthService, DeliveryReceipt, EmailError, FileHost, Mailer, OutgoingEmail, UploadProfile,
    UploadedFile,
};
use warehub_portal::state::AppState;

/// Address that receives space request notifications in tests.
pub const ADMIN_INBOX: &str = "ops@warehub.test";

pub const PASSWORD: &str = "correct-horse-battery";

/// Records every message instead of sending it. Optionally fails.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: bool,
}

impl RecordingMailer {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, EmailError> {
        if self.fail {
            return Err(EmailError::InvalidAddress("relay refused the message".to_owned()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email);
        Ok(DeliveryReceipt {
            message_id: format!("<test-{}@warehub.test>", sent.len()),
        })
    }
}

/// Keeps uploaded files in memory and returns `https://files.test/<preset>/<name>`.
#[derive(Debug, Default)]
pub struct FakeFileHost {
    uploads: Mutex<Vec<(UploadProfile, UploadedFile)>>,
}

impl FakeFileHost {
    pub fn uploads(&self) -> Vec<(UploadProfile, UploadedFile)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileHost for FakeFileHost {
    async fn upload(&self, file: UploadedFile, profile: UploadProfile) -> Option<String> {
        let url = format!("https://files.test/{}/{}", profile.preset(), file.file_name);
        self.uploads.lock().unwrap().push((profile, file));
        Some(url)
    }
}

/// A response with its body decoded.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
}

impl TestResponse {
    /// The body as JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", self.text))
    }

    /// The `Location` header of a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

fn test_config() -> PortalConfig {
    PortalConfig {
        store: StoreBackend::Memory,
        host: "127.0.0.1".parse().unwrap(),
        port: 3000,
        base_url: Url::parse("http://localhost:3000").unwrap(),
        session_secret: SecretString::from("k7Qp2Zr9Lw4Xv8Nc1Bt6Hy3Jm5Fd0Gs!"),
        session_ttl_hours: 24,
        admin_notification_email: Email::parse(ADMIN_INBOX).unwrap(),
        email: None,
        uploads: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
        tls: None,
    }
}

/// The portal wired to in-memory collaborators.
pub struct TestApp {
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub files: Arc<FakeFileHost>,
    router: Router,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_mailer(RecordingMailer::default())
    }

    #[must_use]
    pub fn with_mailer(mailer: RecordingMailer) -> Self {
        let mailer = Arc::new(mailer);
        let files = Arc::new(FakeFileHost::default());
        let state = AppState::new(
            test_config(),
            Arc::new(MemoryDatabase::new()),
            mailer.clone(),
            files.clone(),
        );
        let router = warehub_portal::app(state.clone());
        Self {
            state,
            mailer,
            files,
            router,
        }
    }

    /// Create an active account and return it with a session token.
    pub async fn account(&self, role: Role, email: &str) -> (User, String) {
        let user = AuthService::new(self.state.db().users())
            .create_account(NewAccount {
                name: format!("{role} {email}"),
                email,
                password: Some(PASSWORD),
                role,
                status: UserStatus::Active,
                profile: BusinessProfile::default(),
            })
            .await
            .unwrap();
        let token = self.state.sessions().issue(&user).unwrap();
        (user, token)
    }

    pub async fn admin(&self) -> String {
        self.account(Role::Admin, "admin@warehub.test").await.1
    }

    pub async fn customer(&self, email: &str) -> (User, String) {
        self.account(Role::Customer, email).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.send(with_session(Request::get(path), token).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: &Value) -> TestResponse {
        let request = with_session(Request::post(path), token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_form(&self, path: &str, token: Option<&str>, body: &str) -> TestResponse {
        let request = with_session(Request::post(path), token)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap();
        self.send(request).await
    }

    /// Create a warehouse as admin and return its id.
    pub async fn warehouse(&self, admin: &str, code: &str) -> i64 {
        let response = self
            .post_json(
                "/dashboard/warehouses",
                Some(admin),
                &serde_json::json!({
                    "code": code,
                    "name": "Northgate Logistics Park",
                    "location": "Leeds",
                    "storageType": "AMBIENT",
                    "capacity": "12000",
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        response.json()["data"]["id"].as_i64().unwrap()
    }

    /// Create a space as admin and return its id.
    pub async fn space(&self, admin: &str, warehouse_id: i64, code: &str, status: &str) -> i64 {
        let response = self
            .post_json(
                "/dashboard/spaces",
                Some(admin),
                &serde_json::json!({
                    "warehouseId": warehouse_id.to_string(),
                    "code": code,
                    "name": format!("Pallet bay {code}"),
                    "spaceType": "Pallet bay",
                    "size": "250",
                    "rate": "420.00",
                    "status": status,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        response.json()["data"]["id"].as_i64().unwrap()
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

fn with_session(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::COOKIE, format!("{SESSION_COOKIE}={token}")),
        None => builder,
    }
}
