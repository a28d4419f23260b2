//! Invoices issued to customers.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use warehub_core::{InvoiceId, InvoiceStatus, SpaceId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    /// Unique number, `INV-YYYYMMDD-XXXXXX`.
    pub number: String,
    pub client_id: UserId,
    pub space_id: SpaceId,
    pub amount: Decimal,
    pub tax: Decimal,
    /// Always `amount + tax`.
    pub total_amount: Decimal,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Set when the invoice moves to `PAID`, cleared when it leaves it.
    pub paid_at: Option<DateTime<Utc>>,
    pub attachment_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub number: String,
    pub client_id: UserId,
    pub space_id: SpaceId,
    pub amount: Decimal,
    pub tax: Decimal,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub attachment_url: Option<String>,
    pub notes: Option<String>,
}

impl NewInvoice {
    #[must_use]
    pub fn total_amount(&self) -> Decimal {
        self.amount + self.tax
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub client_name: String,
    pub space_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct InvoiceFilter {
    /// Matches the invoice number or client name.
    pub search: Option<String>,
    pub status: Option<InvoiceStatus>,
    /// Restricts the listing to one client.
    pub client_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStats {
    pub total: u64,
    pub by_status: BTreeMap<InvoiceStatus, u64>,
    /// Sum of totals not yet paid (pending and overdue).
    pub outstanding_amount: Decimal,
    pub paid_amount: Decimal,
}
