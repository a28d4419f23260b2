//! Entity actions.
//!
//! Every create, update and delete runs the same pipeline:
//!
//! 1. **Validate** the submitted form. Inputs arrive as strings and are
//!    coerced; failures return a field-keyed error map before any store
//!    access.
//! 2. **Authorize** the explicit [`Caller`] against a [`Capability`], then
//!    check ownership where it applies.
//! 3. **Persist** through exactly one repository call, then invalidate the
//!    affected listing views.
//!
//! Reads skip validation beyond their query parameters and serve listings
//! through the view cache. Actions never panic; the routes wrap their
//! results in an [`Envelope`].

pub mod agreements;
pub mod analytics;
pub mod auth;
pub mod clients;
pub mod invoices;
pub mod space_requests;
pub mod spaces;
pub mod support;
pub mod validate;
pub mod warehouses;

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use warehub_core::{Capability, Page, PageRequest};

use crate::db::RepositoryError;
use crate::models::Caller;
use crate::services::uploads::MAX_ATTACHMENT_BYTES;
use crate::services::{UploadProfile, UploadedFile};
use crate::state::AppState;

pub use validate::Validator;

/// Field name to message.
pub type FieldErrors = BTreeMap<String, String>;

/// Shown for every failure whose detail stays in the logs.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Why an action failed.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Submitted fields failed validation.
    #[error("Please correct the highlighted fields")]
    Validation(FieldErrors),

    /// The caller may not do this. Never says why.
    #[error("Unauthorized")]
    Unauthorized,

    /// The named entity does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The entity is in a state that forbids the operation.
    #[error("{0}")]
    Conflict(String),

    /// A store or outbound dependency failed. Carries the public message.
    #[error("{0}")]
    Dependency(String),
}

impl ActionError {
    /// Validation failure on a single field.
    #[must_use]
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        Self::Validation(BTreeMap::from([(name.to_owned(), message.into())]))
    }

    /// Log and report a dependency failure, returning the generic error.
    #[must_use]
    pub fn dependency(context: &str, error: &dyn std::error::Error) -> Self {
        let event_id = sentry::capture_error(error);
        tracing::error!(
            error = %error,
            context,
            sentry_event_id = %event_id,
            "Action dependency failed"
        );
        Self::Dependency(GENERIC_FAILURE.to_owned())
    }

    /// HTTP status for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Dependency(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Translate a repository failure while acting on `entity`.
    pub(crate) fn from_store(entity: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |error| match error {
            RepositoryError::NotFound => Self::NotFound(entity),
            RepositoryError::Conflict(field) => {
                let message = format!("This {field} is already in use");
                Self::Validation(BTreeMap::from([(field, message)]))
            }
            RepositoryError::InvalidState(message) => Self::Conflict(message),
            other @ (RepositoryError::Database(_) | RepositoryError::DataCorruption(_)) => {
                Self::dependency(entity, &other)
            }
        }
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

impl Caller {
    /// Check that the caller's role grants `capability`.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Unauthorized` otherwise.
    pub fn require(&self, capability: Capability) -> ActionResult<()> {
        if self.role.can(capability) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, role = %self.role, ?capability, "Capability denied");
            Err(ActionError::Unauthorized)
        }
    }
}

/// Uniform JSON response body.
///
/// `{"success": true, "data": ...}` on success and
/// `{"success": false, "error": "...", "errors": {...}}` on failure.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> Envelope<T> {
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            errors: None,
            status: StatusCode::OK,
        }
    }

    #[must_use]
    pub const fn created(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            errors: None,
            status: StatusCode::CREATED,
        }
    }
}

impl Envelope<()> {
    /// Success without a payload.
    #[must_use]
    pub const fn done() -> Self {
        Self::ok(())
    }

    #[must_use]
    pub fn failure(error: ActionError) -> Self {
        let status = error.status();
        let message = error.to_string();
        let errors = match error {
            ActionError::Validation(errors) => Some(errors),
            _ => None,
        };
        Self {
            success: false,
            data: None,
            error: Some(message),
            errors,
            status,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        Envelope::failure(self).into_response()
    }
}

/// A page of results together with the stats block shown above it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing<T, S> {
    #[serde(flatten)]
    pub page: Page<T>,
    pub stats: S,
}

/// Query string accepted by every listing.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    pub status: Option<String>,
    /// Secondary filter: storage type, warehouse id or ticket category.
    pub kind: Option<String>,
}

impl ListQuery {
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }

    /// The search term, trimmed, if any.
    #[must_use]
    pub fn search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    }
}

/// Cache key for one listing page.
pub(crate) fn listing_key(filter: &impl std::fmt::Debug, page: PageRequest) -> String {
    format!("{filter:?}|{}|{}", page.page(), page.page_size())
}

/// A single submitted status field.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct StatusForm {
    pub status: String,
}

/// Reject an attachment over the size limit. Empty uploads count as absent.
pub(crate) fn check_attachment(
    v: &mut Validator,
    file: Option<UploadedFile>,
) -> Option<UploadedFile> {
    let file = file.filter(|f| !f.bytes.is_empty())?;
    v.check(
        file.bytes.len() <= MAX_ATTACHMENT_BYTES,
        "attachment",
        "Attachment must be 10 MB or smaller",
    );
    Some(file)
}

/// Push an attachment to the file host, returning its URL.
pub(crate) async fn store_attachment(
    state: &AppState,
    file: Option<UploadedFile>,
    profile: UploadProfile,
) -> ActionResult<Option<String>> {
    let Some(file) = file else {
        return Ok(None);
    };
    match state.files().upload(file, profile).await {
        Some(url) => Ok(Some(url)),
        None => Err(ActionError::Dependency(
            "The attachment could not be uploaded. Please try again.".to_owned(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use warehub_core::{Role, UserId};

    use super::*;

    fn caller(role: Role) -> Caller {
        Caller {
            id: UserId::new(1),
            role,
            name: "Test".to_owned(),
            email: "test@warehub.test".to_owned(),
        }
    }

    #[test]
    fn test_require_checks_role_capabilities() {
        assert!(caller(Role::Admin).require(Capability::ManageInventory).is_ok());
        assert!(matches!(
            caller(Role::Customer).require(Capability::ManageInventory),
            Err(ActionError::Unauthorized)
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ActionError::field("capacity", "bad").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ActionError::Unauthorized.status(), StatusCode::FORBIDDEN);
        assert_eq!(ActionError::NotFound("Space").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ActionError::Conflict("Space is not available".to_owned()).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_failure_envelope_shape() {
        let body = serde_json::to_value(Envelope::failure(ActionError::field(
            "capacity",
            "Capacity must be a positive whole number",
        )))
        .unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(
            body["errors"]["capacity"],
            "Capacity must be a positive whole number"
        );
        assert!(body.get("data").is_none());
    }

    #[test]
    fn test_success_envelope_shape() {
        let body = serde_json::to_value(Envelope::ok(vec![1, 2])).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": [1, 2]}));
    }

    #[test]
    fn test_not_found_message_names_entity() {
        assert_eq!(
            ActionError::NotFound("Warehouse").to_string(),
            "Warehouse not found"
        );
    }

    #[test]
    fn test_store_conflict_becomes_field_error() {
        let err = ActionError::from_store("Warehouse")(RepositoryError::Conflict("code".to_owned()));
        let ActionError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors["code"], "This code is already in use");
    }
}
