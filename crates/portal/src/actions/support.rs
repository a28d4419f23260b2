//! Support ticket actions.
//!
//! Customers open tickets and may withdraw their own; admins triage,
//! resolve and delete any ticket.

use serde::Deserialize;
use tracing::instrument;

use warehub_core::{
    Capability, SpaceId, TicketCategory, TicketId, TicketPriority, TicketStatus, UserId,
};

use super::{
    ActionError, ActionResult, ListQuery, Listing, Validator, check_attachment, listing_key,
    store_attachment,
};
use crate::db::RepositoryError;
use crate::models::{
    Caller, NewTicket, SupportTicket, TicketChanges, TicketDetail, TicketFilter, TicketStats,
};
use crate::services::{UploadProfile, UploadedFile, View};
use crate::state::AppState;

const ENTITY: &str = "Ticket";

pub type TicketListing = Listing<TicketDetail, TicketStats>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TicketForm {
    pub subject: String,
    pub message: String,
    pub category: String,
    pub priority: String,
    /// Optional; must be one of the customer's leased spaces.
    pub space_id: String,
}

/// Admin triage. Blank fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TriageForm {
    pub status: String,
    pub priority: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResolveForm {
    pub resolution: String,
}

impl TicketForm {
    fn validate(&self, v: &mut Validator, client_id: UserId) -> NewTicket {
        NewTicket {
            client_id,
            space_id: v.parse_optional::<SpaceId>("spaceId", "Space", &self.space_id),
            subject: v.required("subject", "Subject", &self.subject),
            message: v.required_long("message", "Message", &self.message),
            category: v.parse_or("category", "Category", &self.category, TicketCategory::General),
            priority: v.parse_or("priority", "Priority", &self.priority, TicketPriority::Medium),
            attachment_url: None,
        }
    }
}

impl TriageForm {
    fn validate(&self) -> ActionResult<TicketChanges> {
        let mut v = Validator::new();
        let changes = TicketChanges {
            status: v.parse_optional::<TicketStatus>("status", "Status", &self.status),
            priority: v.parse_optional::<TicketPriority>("priority", "Priority", &self.priority),
        };
        v.finish()?;
        Ok(changes)
    }
}

/// Admins see every ticket; customers only their own.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list(state: &AppState, caller: &Caller, query: &ListQuery) -> ActionResult<TicketListing> {
    let client_id = if caller.require(Capability::ManageSupport).is_ok() {
        None
    } else {
        caller.require(Capability::SubmitTickets)?;
        Some(caller.id)
    };

    let mut v = Validator::new();
    let filter = TicketFilter {
        search: query.search(),
        status: v.parse_optional("status", "Status", query.status.as_deref().unwrap_or_default()),
        category: v.parse_optional("kind", "Category", query.kind.as_deref().unwrap_or_default()),
        client_id,
    };
    v.finish()?;

    let page = query.page_request();
    let db = state.db();
    state
        .views()
        .get_or_load(View::Tickets, listing_key(&filter, page), || async {
            let items = db.tickets().list(&filter, page).await?;
            let stats = db.tickets().stats(&filter).await?;
            Ok::<_, RepositoryError>(Listing { page: items, stats })
        })
        .await
        .map_err(ActionError::from_store(ENTITY))
}

/// Fetch a ticket the caller may see.
async fn visible(state: &AppState, caller: &Caller, id: TicketId) -> ActionResult<TicketDetail> {
    let detail = state
        .db()
        .tickets()
        .get(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?
        .ok_or(ActionError::NotFound(ENTITY))?;

    if caller.require(Capability::ManageSupport).is_ok() {
        return Ok(detail);
    }
    caller.require(Capability::SubmitTickets)?;
    if detail.ticket.client_id != caller.id {
        return Err(ActionError::NotFound(ENTITY));
    }
    Ok(detail)
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn get(state: &AppState, caller: &Caller, id: TicketId) -> ActionResult<TicketDetail> {
    visible(state, caller, id).await
}

/// Open a ticket on behalf of the calling customer.
#[instrument(skip(state, caller, form, attachment), fields(user_id = %caller.id))]
pub async fn create(
    state: &AppState,
    caller: &Caller,
    form: TicketForm,
    attachment: Option<UploadedFile>,
) -> ActionResult<SupportTicket> {
    let mut v = Validator::new();
    let mut ticket = form.validate(&mut v, caller.id);
    let attachment = check_attachment(&mut v, attachment);
    v.finish()?;
    caller.require(Capability::SubmitTickets)?;

    if let Some(space_id) = ticket.space_id {
        let leased = state
            .db()
            .spaces()
            .list_for_client(caller.id)
            .await
            .map_err(ActionError::from_store(ENTITY))?
            .iter()
            .any(|s| s.space.id == space_id);
        if !leased {
            return Err(ActionError::field("spaceId", "Choose one of your spaces"));
        }
    }

    ticket.attachment_url = store_attachment(state, attachment, UploadProfile::Support).await?;

    let ticket = state
        .db()
        .tickets()
        .create(ticket)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(&[View::Tickets, View::Analytics]);

    tracing::info!(ticket_id = %ticket.id, category = %ticket.category, "Ticket opened");
    Ok(ticket)
}

/// Change a ticket's status or priority.
#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn update(
    state: &AppState,
    caller: &Caller,
    id: TicketId,
    form: TriageForm,
) -> ActionResult<SupportTicket> {
    let changes = form.validate()?;
    caller.require(Capability::ManageSupport)?;

    let ticket = state
        .db()
        .tickets()
        .update(id, changes)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(&[View::Tickets, View::Analytics]);

    tracing::info!(ticket_id = %ticket.id, status = %ticket.status, priority = %ticket.priority, "Ticket updated");
    Ok(ticket)
}

/// Mark a ticket resolved. Resolving a resolved ticket succeeds unchanged.
#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn resolve(
    state: &AppState,
    caller: &Caller,
    id: TicketId,
    form: ResolveForm,
) -> ActionResult<SupportTicket> {
    let mut v = Validator::new();
    let resolution = v.optional("resolution", "Resolution", &form.resolution);
    v.finish()?;
    caller.require(Capability::ManageSupport)?;

    let ticket = state
        .db()
        .tickets()
        .resolve(id, resolution)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(&[View::Tickets, View::Analytics]);

    tracing::info!(ticket_id = %ticket.id, "Ticket resolved");
    Ok(ticket)
}

/// Delete a ticket. Customers may only delete their own.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn delete(state: &AppState, caller: &Caller, id: TicketId) -> ActionResult<()> {
    if caller.require(Capability::ManageSupport).is_err() {
        caller.require(Capability::SubmitTickets)?;
        let owner = state
            .db()
            .tickets()
            .get(id)
            .await
            .map_err(ActionError::from_store(ENTITY))?
            .map(|d| d.ticket.client_id);
        match owner {
            None => return Err(ActionError::NotFound(ENTITY)),
            Some(owner) if owner != caller.id => {
                tracing::warn!(ticket_id = %id, owner = %owner, "Ticket delete by non-owner refused");
                return Err(ActionError::Unauthorized);
            }
            Some(_) => {}
        }
    }

    state
        .db()
        .tickets()
        .delete(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(&[View::Tickets, View::Analytics]);

    tracing::info!(ticket_id = %id, "Ticket deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_defaults() {
        let form = TicketForm {
            subject: "Door jammed".to_owned(),
            message: "The roller door on bay 4 will not open.".to_owned(),
            ..TicketForm::default()
        };
        let mut v = Validator::new();
        let ticket = form.validate(&mut v, UserId::new(2));
        assert!(v.is_valid());
        assert_eq!(ticket.subject, "Door jammed");
        assert_eq!(ticket.client_id, UserId::new(2));
        assert_eq!(ticket.category, TicketCategory::General);
        assert_eq!(ticket.priority, TicketPriority::Medium);
        assert_eq!(ticket.space_id, None);
    }

    #[test]
    fn test_ticket_requires_subject_and_message() {
        let mut v = Validator::new();
        TicketForm::default().validate(&mut v, UserId::new(2));
        let Err(ActionError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("subject"));
        assert!(errors.contains_key("message"));
    }

    #[test]
    fn test_blank_triage_changes_nothing() {
        let Ok(changes) = TriageForm::default().validate() else {
            panic!("expected valid form");
        };
        assert_eq!(changes, TicketChanges::default());
    }

    #[test]
    fn test_triage_parses_status() {
        let form = TriageForm {
            status: "in-progress".to_owned(),
            priority: "urgent".to_owned(),
        };
        let Ok(changes) = form.validate() else {
            panic!("expected valid form");
        };
        assert_eq!(changes.status, Some(TicketStatus::InProgress));
        assert_eq!(changes.priority, Some(TicketPriority::Urgent));
    }
}
