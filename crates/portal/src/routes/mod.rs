//! HTTP route handlers for the portal.
//!
//! # Route Structure
//!
//! ```text
//! # Public
//! GET  /                                  - Landing page
//! GET  /login                             - Login page
//! GET  /register                          - Registration page
//! GET  /health                            - Liveness
//! GET  /health/ready                      - Readiness (store ping)
//! POST /api/auth/login                    - Log in, sets the session cookie
//! POST /api/auth/register                 - Register a customer (pending)
//! POST /api/auth/logout                   - Clear the session cookie
//! GET  /api/spaces/available              - Catalog of available spaces
//! POST /api/space-requests                - Request a space
//!
//! # Admin
//! GET  /dashboard                         - Overview counts
//! GET  /dashboard/warehouses              - List (POST creates)
//! GET  /dashboard/warehouses/{id}         - Detail (POST updates)
//! POST /dashboard/warehouses/{id}/delete  - Delete
//! ...  /dashboard/spaces                  - Same shape as warehouses
//! ...  /dashboard/agreements              - Same shape as warehouses
//! ...  /dashboard/clients                 - Same shape, plus POST {id}/status
//! GET  /dashboard/space-requests          - List
//! GET  /dashboard/space-requests/{id}     - Detail
//! POST /dashboard/space-requests/{id}/approve
//! POST /dashboard/space-requests/{id}/reject
//! POST /api/admin/users                   - Create an admin account
//! GET  /api/analytics/{revenue,occupancy,business-types,overview}
//!
//! # Customer (admins see everything)
//! GET  /dashboard/my-spaces               - Leased spaces
//! GET  /dashboard/my-agreements[/{id}]    - Own agreements
//! GET  /dashboard/invoices[/{id}]         - Invoices (POST creates, admin)
//! POST /dashboard/invoices/{id}/status    - Set status (admin)
//! POST /dashboard/invoices/{id}/delete    - Delete (admin)
//! GET  /dashboard/support[/{id}]          - Tickets (POST creates)
//! POST /dashboard/support/{id}            - Triage (admin)
//! POST /dashboard/support/{id}/delete     - Delete (admin any, customer own)
//! POST /api/support/{id}/resolve          - Resolve (admin, idempotent)
//! GET  /dashboard/profile                 - Own profile (POST updates)
//! POST /dashboard/profile/password        - Change password
//! ```
//!
//! Dashboard and API handlers answer with the JSON [`Envelope`]. Mutations
//! accept either JSON or a urlencoded form; invoice and ticket creation also
//! accept `multipart/form-data` carrying an `attachment` file.

pub mod agreements;
pub mod analytics;
pub mod auth;
pub mod clients;
pub mod health;
pub mod invoices;
pub mod pages;
pub mod space_requests;
pub mod spaces;
pub mod support;
pub mod warehouses;

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Multipart, Request},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::actions::{ActionError, ActionResult, Envelope};
use crate::services::UploadedFile;
use crate::state::AppState;

/// Form field carrying an uploaded file.
pub const ATTACHMENT_FIELD: &str = "attachment";

/// Wrap an action result in the envelope with `200 OK`.
pub(crate) fn respond<T: Serialize>(result: ActionResult<T>) -> Response {
    match result {
        Ok(data) => Envelope::ok(data).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Wrap an action result in the envelope with `201 Created`.
pub(crate) fn respond_created<T: Serialize>(result: ActionResult<T>) -> Response {
    match result {
        Ok(data) => Envelope::created(data).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Acknowledge an action without a payload.
pub(crate) fn respond_done(result: ActionResult<()>) -> Response {
    match result {
        Ok(()) => Envelope::done().into_response(),
        Err(e) => e.into_response(),
    }
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Whether the client sent or asked for JSON rather than a browser form.
pub(crate) fn wants_json(headers: &HeaderMap) -> bool {
    content_type(headers).starts_with("application/json")
        || headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("application/json"))
}

fn unreadable() -> ActionError {
    ActionError::field("form", "The submitted form could not be read")
}

/// A submitted body, either JSON or `application/x-www-form-urlencoded`.
#[derive(Debug, Clone)]
pub struct Submitted<T>(pub T);

impl<S, T> FromRequest<S> for Submitted<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ActionError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        if content_type(request.headers()).starts_with("application/json") {
            let Json(form) = Json::<T>::from_request(request, state).await.map_err(|e| {
                tracing::debug!(error = %e, "Rejected JSON body");
                unreadable()
            })?;
            Ok(Self(form))
        } else {
            let Form(form) = Form::<T>::from_request(request, state).await.map_err(|e| {
                tracing::debug!(error = %e, "Rejected form body");
                unreadable()
            })?;
            Ok(Self(form))
        }
    }
}

/// A submitted form with an optional file in the `attachment` field.
#[derive(Debug, Clone)]
pub struct WithAttachment<T> {
    pub form: T,
    pub attachment: Option<UploadedFile>,
}

impl<S, T> FromRequest<S> for WithAttachment<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ActionError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !content_type(request.headers()).starts_with("multipart/form-data") {
            let Submitted(form) = Submitted::<T>::from_request(request, state).await?;
            return Ok(Self {
                form,
                attachment: None,
            });
        }

        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|_| unreadable())?;
        let mut fields = serde_json::Map::new();
        let mut attachment = None;

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::debug!(error = %e, "Rejected multipart body");
            unreadable()
        })? {
            let name = field.name().unwrap_or_default().to_owned();
            if name == ATTACHMENT_FIELD {
                let file_name = field.file_name().unwrap_or("attachment").to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await.map_err(|_| unreadable())?;
                attachment = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else {
                let value = field.text().await.map_err(|_| unreadable())?;
                fields.insert(name, serde_json::Value::String(value));
            }
        }

        let form = serde_json::from_value(serde_json::Value::Object(fields)).map_err(|e| {
            tracing::debug!(error = %e, "Multipart fields did not match the form");
            unreadable()
        })?;
        Ok(Self { form, attachment })
    }
}

/// Create all routes for the portal.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(pages::routes())
        .merge(health::routes())
        .nest("/api/auth", auth::routes())
        .merge(spaces::routes())
        .merge(space_requests::routes())
        .merge(warehouses::routes())
        .merge(agreements::routes())
        .merge(invoices::routes())
        .merge(support::routes())
        .merge(clients::routes())
        .merge(analytics::routes())
}
