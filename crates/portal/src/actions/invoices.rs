//! Invoice actions.
//!
//! Admins issue and manage invoices; customers see their own.

use chrono::{NaiveDate, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::Deserialize;
use tracing::instrument;

use warehub_core::{Capability, InvoiceId, InvoiceStatus, SpaceId, UserId};

use super::{
    ActionError, ActionResult, ListQuery, Listing, StatusForm, Validator, check_attachment,
    listing_key, store_attachment,
};
use crate::db::RepositoryError;
use crate::models::{Caller, Invoice, InvoiceDetail, InvoiceFilter, InvoiceStats, NewInvoice};
use crate::services::{UploadProfile, UploadedFile, View};
use crate::state::AppState;

const ENTITY: &str = "Invoice";

pub type InvoiceListing = Listing<InvoiceDetail, InvoiceStats>;

/// Submitted invoice fields. The attachment travels separately.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvoiceForm {
    pub client_id: String,
    pub space_id: String,
    pub amount: String,
    pub tax: String,
    pub status: String,
    /// Blank means today.
    pub issue_date: String,
    pub due_date: String,
    pub notes: String,
}

impl InvoiceForm {
    fn validate(&self, today: NaiveDate) -> (Validator, NewInvoice) {
        let mut v = Validator::new();
        let client_id = v.parse::<UserId>("clientId", "Client", &self.client_id);
        let space_id = v.parse::<SpaceId>("spaceId", "Space", &self.space_id);
        let amount = v.positive_decimal("amount", "Amount", &self.amount);
        let tax = v.non_negative_decimal("tax", "Tax", &self.tax);
        let status = v.parse_or("status", "Status", &self.status, InvoiceStatus::Pending);
        let issue_date = if self.issue_date.trim().is_empty() {
            today
        } else {
            v.date("issueDate", "Issue date", &self.issue_date)
        };
        let due_date = v.date("dueDate", "Due date", &self.due_date);
        if v.is_valid() {
            v.check(
                due_date >= issue_date,
                "dueDate",
                "Due date cannot be before the issue date",
            );
        }
        let notes = v.optional("notes", "Notes", &self.notes);

        let invoice = NewInvoice {
            number: invoice_number(today),
            client_id: client_id.unwrap_or(UserId::new(0)),
            space_id: space_id.unwrap_or(SpaceId::new(0)),
            amount,
            tax,
            status,
            issue_date,
            due_date,
            attachment_url: None,
            notes,
        };
        (v, invoice)
    }
}

/// A fresh invoice number, `INV-YYYYMMDD-XXXXXX`.
fn invoice_number(today: NaiveDate) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("INV-{}-{suffix}", today.format("%Y%m%d"))
}

/// Admins see every invoice; customers only their own.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list(state: &AppState, caller: &Caller, query: &ListQuery) -> ActionResult<InvoiceListing> {
    let client_id = if caller.require(Capability::ManageInvoices).is_ok() {
        None
    } else {
        caller.require(Capability::ViewOwnLeases)?;
        Some(caller.id)
    };

    let mut v = Validator::new();
    let filter = InvoiceFilter {
        search: query.search(),
        status: v.parse_optional("status", "Status", query.status.as_deref().unwrap_or_default()),
        client_id,
    };
    v.finish()?;

    let page = query.page_request();
    let db = state.db();
    state
        .views()
        .get_or_load(View::Invoices, listing_key(&filter, page), || async {
            let items = db.invoices().list(&filter, page).await?;
            let stats = db.invoices().stats(&filter).await?;
            Ok::<_, RepositoryError>(Listing { page: items, stats })
        })
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn get(state: &AppState, caller: &Caller, id: InvoiceId) -> ActionResult<InvoiceDetail> {
    let detail = state
        .db()
        .invoices()
        .get(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?
        .ok_or(ActionError::NotFound(ENTITY))?;

    if caller.require(Capability::ManageInvoices).is_ok() {
        return Ok(detail);
    }
    caller.require(Capability::ViewOwnLeases)?;
    if detail.invoice.client_id != caller.id {
        return Err(ActionError::NotFound(ENTITY));
    }
    Ok(detail)
}

/// Issue an invoice to a client for a space they lease.
#[instrument(skip(state, caller, form, attachment), fields(user_id = %caller.id))]
pub async fn create(
    state: &AppState,
    caller: &Caller,
    form: InvoiceForm,
    attachment: Option<UploadedFile>,
) -> ActionResult<Invoice> {
    let (mut v, mut invoice) = form.validate(Utc::now().date_naive());
    let attachment = check_attachment(&mut v, attachment);
    v.finish()?;
    caller.require(Capability::ManageInvoices)?;

    let leased = state
        .db()
        .agreements()
        .client_has_agreement(invoice.client_id, invoice.space_id)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    if !leased {
        return Err(ActionError::field(
            "spaceId",
            "The client has no agreement for this space",
        ));
    }

    invoice.attachment_url = store_attachment(state, attachment, UploadProfile::Invoices).await?;

    let invoice = state
        .db()
        .invoices()
        .create(invoice)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => ActionError::field("clientId", "Client or space not found"),
            other => ActionError::from_store(ENTITY)(other),
        })?;
    state.views().invalidate(&[View::Invoices, View::Analytics]);

    tracing::info!(
        invoice_id = %invoice.id,
        number = %invoice.number,
        total = %invoice.total_amount,
        "Invoice created"
    );
    Ok(invoice)
}

/// Mark an invoice pending, paid or overdue.
#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn set_status(
    state: &AppState,
    caller: &Caller,
    id: InvoiceId,
    form: StatusForm,
) -> ActionResult<Invoice> {
    let mut v = Validator::new();
    let status = v.parse::<InvoiceStatus>("status", "Status", &form.status);
    v.finish()?;
    caller.require(Capability::ManageInvoices)?;

    let invoice = state
        .db()
        .invoices()
        .set_status(id, status.unwrap_or(InvoiceStatus::Pending))
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(&[View::Invoices, View::Analytics]);

    tracing::info!(invoice_id = %invoice.id, status = %invoice.status, "Invoice status updated");
    Ok(invoice)
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn delete(state: &AppState, caller: &Caller, id: InvoiceId) -> ActionResult<()> {
    caller.require(Capability::ManageInvoices)?;

    state
        .db()
        .invoices()
        .delete(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(&[View::Invoices, View::Analytics]);

    tracing::info!(invoice_id = %id, "Invoice deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default()
    }

    fn form() -> InvoiceForm {
        InvoiceForm {
            client_id: "3".to_owned(),
            space_id: "5".to_owned(),
            amount: "1000".to_owned(),
            tax: "200".to_owned(),
            due_date: "2026-03-31".to_owned(),
            ..InvoiceForm::default()
        }
    }

    #[test]
    fn test_invoice_number_format() {
        let number = invoice_number(today());
        assert!(number.starts_with("INV-20260301-"));
        let suffix = number.trim_start_matches("INV-20260301-");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_form_defaults() {
        let (v, invoice) = form().validate(today());
        assert!(v.is_valid());
        assert_eq!(invoice.issue_date, today());
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.total_amount(), Decimal::new(1200, 0));
    }

    #[test]
    fn test_due_date_before_issue_is_rejected() {
        let form = InvoiceForm {
            issue_date: "2026-04-01".to_owned(),
            ..form()
        };
        let (v, _) = form.validate(today());
        let Err(ActionError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("dueDate"));
    }

    #[test]
    fn test_oversized_attachment_is_a_field_error() {
        let mut v = Validator::new();
        let file = UploadedFile {
            file_name: "scan.pdf".to_owned(),
            content_type: "application/pdf".to_owned(),
            bytes: vec![0; crate::services::uploads::MAX_ATTACHMENT_BYTES + 1],
        };
        assert!(check_attachment(&mut v, Some(file)).is_some());
        assert!(!v.is_valid());
    }

    #[test]
    fn test_empty_attachment_counts_as_absent() {
        let mut v = Validator::new();
        let file = UploadedFile {
            file_name: String::new(),
            content_type: "application/octet-stream".to_owned(),
            bytes: Vec::new(),
        };
        assert!(check_attachment(&mut v, Some(file)).is_none());
        assert!(v.is_valid());
    }
}
