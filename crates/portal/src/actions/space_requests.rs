//! Public requests to rent a space, and their review by admins.
//!
//! A submitted request reserves the space and notifies the admin address by
//! email. The reservation only stands if the notification goes out; when
//! delivery fails the request is withdrawn and the space released.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use warehub_core::{Capability, Page, SpaceId, SpaceRequestId};

use super::agreements::{AgreementForm, require_active_customer};
use super::{ActionError, ActionResult, ListQuery, Validator, listing_key};
use crate::models::{
    Agreement, AgreementDraft, Caller, NewSpaceRequest, SpaceRequest, SpaceRequestDetail, SpaceRequestFilter,
};
use crate::services::email::space_request_notification;
use crate::services::view_cache::{SPACE_STATUS_VIEWS, View};
use crate::state::AppState;

const ENTITY: &str = "Space request";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpaceRequestForm {
    pub space_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub message: String,
}

impl SpaceRequestForm {
    fn validate(&self) -> ActionResult<NewSpaceRequest> {
        let mut v = Validator::new();
        let space_id = v.parse::<SpaceId>("spaceId", "Space", &self.space_id);
        let name = v.required("name", "Name", &self.name);
        let email = v.email("email", &self.email);
        let phone = v.optional("phone", "Phone", &self.phone);
        let company = v.optional("company", "Company", &self.company);
        let message = v.optional("message", "Message", &self.message);
        v.finish()?;

        match (space_id, email) {
            (Some(space_id), Some(email)) => Ok(NewSpaceRequest {
                space_id,
                name,
                email,
                phone,
                company,
                message,
            }),
            _ => Err(ActionError::field("spaceId", "Space is required")),
        }
    }
}

/// The outcome of an approval.
#[derive(Debug, Clone, Serialize)]
pub struct Approval {
    pub request: SpaceRequest,
    pub agreement: Agreement,
}

/// Record a request, reserve the space and notify the admins.
#[instrument(skip(state, form), fields(space_id = %form.space_id.trim()))]
pub async fn submit(state: &AppState, form: SpaceRequestForm) -> ActionResult<SpaceRequest> {
    let new_request = form.validate()?;

    let db = state.db();
    let space = db
        .spaces()
        .get(new_request.space_id)
        .await
        .map_err(ActionError::from_store(ENTITY))?
        .ok_or_else(|| ActionError::field("spaceId", "Space not found"))?;

    let request = db
        .space_requests()
        .submit(new_request)
        .await
        .map_err(ActionError::from_store(ENTITY))?;

    let to = state.config().admin_notification_email.clone();
    let sent = match space_request_notification(to, &request, &space) {
        Ok(email) => state.mailer().send(email).await,
        Err(e) => Err(e),
    };
    match sent {
        Ok(receipt) => {
            state.views().invalidate(SPACE_STATUS_VIEWS);
            state.views().invalidate(&[View::SpaceRequests]);
            tracing::info!(
                request_id = %request.id,
                message_id = %receipt.message_id,
                "Space request submitted"
            );
            Ok(request)
        }
        Err(e) => {
            if let Err(withdraw) = db.space_requests().withdraw(request.id).await {
                tracing::error!(
                    request_id = %request.id,
                    error = %withdraw,
                    "Failed to withdraw space request after notification failure"
                );
            }
            Err(ActionError::dependency("space request notification", &e))
        }
    }
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list(
    state: &AppState,
    caller: &Caller,
    query: &ListQuery,
) -> ActionResult<Page<SpaceRequestDetail>> {
    caller.require(Capability::ReviewSpaceRequests)?;

    let mut v = Validator::new();
    let filter = SpaceRequestFilter {
        search: query.search(),
        status: v.parse_optional("status", "Status", query.status.as_deref().unwrap_or_default()),
    };
    v.finish()?;

    let page = query.page_request();
    let db = state.db();
    state
        .views()
        .get_or_load(View::SpaceRequests, listing_key(&filter, page), || {
            db.space_requests().list(&filter, page)
        })
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn get(
    state: &AppState,
    caller: &Caller,
    id: SpaceRequestId,
) -> ActionResult<SpaceRequestDetail> {
    caller.require(Capability::ReviewSpaceRequests)?;
    state
        .db()
        .space_requests()
        .get(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?
        .ok_or(ActionError::NotFound(ENTITY))
}

/// Approve a request, leasing the reserved space to a chosen client.
#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn approve(
    state: &AppState,
    caller: &Caller,
    id: SpaceRequestId,
    form: AgreementForm,
) -> ActionResult<Approval> {
    let (client_id, terms) = form.validate_approval()?;
    caller.require(Capability::ReviewSpaceRequests)?;
    require_active_customer(state, client_id).await?;

    let pending = get(state, caller, id).await?;
    let draft = AgreementDraft {
        client_id,
        space_id: pending.request.space_id,
        monthly_rent: terms.monthly_rent,
        deposit: terms.deposit,
        start_date: terms.start_date,
        end_date: terms.end_date,
        terms: terms.terms,
        status: terms.status,
    };

    let (request, agreement) = state
        .db()
        .space_requests()
        .approve(id, draft)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(SPACE_STATUS_VIEWS);
    state.views().invalidate(&[View::SpaceRequests, View::Agreements]);

    tracing::info!(
        request_id = %request.id,
        agreement_id = %agreement.id,
        "Space request approved"
    );
    Ok(Approval { request, agreement })
}

/// Reject a request and release its space.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn reject(state: &AppState, caller: &Caller, id: SpaceRequestId) -> ActionResult<SpaceRequest> {
    caller.require(Capability::ReviewSpaceRequests)?;

    let request = state
        .db()
        .space_requests()
        .reject(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(SPACE_STATUS_VIEWS);
    state.views().invalidate(&[View::SpaceRequests]);

    tracing::info!(request_id = %request.id, "Space request rejected");
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_normalized() {
        let form = SpaceRequestForm {
            space_id: "12".to_owned(),
            name: " Acme ".to_owned(),
            email: "A@B.com".to_owned(),
            ..SpaceRequestForm::default()
        };
        let Ok(request) = form.validate() else {
            panic!("expected valid form");
        };
        assert_eq!(request.space_id, SpaceId::new(12));
        assert_eq!(request.name, "Acme");
        assert_eq!(request.email.as_str(), "a@b.com");
        assert_eq!(request.company, None);
    }

    #[test]
    fn test_request_needs_contact_details() {
        let form = SpaceRequestForm {
            space_id: "12".to_owned(),
            ..SpaceRequestForm::default()
        };
        let Err(ActionError::Validation(errors)) = form.validate() else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("email"));
        assert!(!errors.contains_key("spaceId"));
    }
}
