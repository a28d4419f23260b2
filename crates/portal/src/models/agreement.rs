//! Lease agreements between a customer and a space.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use warehub_core::{AgreementId, AgreementStatus, SpaceId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    pub id: AgreementId,
    pub client_id: UserId,
    pub space_id: SpaceId,
    pub monthly_rent: Decimal,
    pub deposit: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub terms: Option<String>,
    pub status: AgreementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new agreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreementDraft {
    pub client_id: UserId,
    pub space_id: SpaceId,
    pub monthly_rent: Decimal,
    pub deposit: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub terms: Option<String>,
    pub status: AgreementStatus,
}

/// Validated replacement of an agreement's editable fields.
///
/// The client and space of an agreement are fixed once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreementChanges {
    pub monthly_rent: Decimal,
    pub deposit: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub terms: Option<String>,
    pub status: AgreementStatus,
}

/// An agreement with client and space names for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementDetail {
    #[serde(flatten)]
    pub agreement: Agreement,
    pub client_name: String,
    pub space_code: String,
    pub space_name: String,
    pub warehouse_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct AgreementFilter {
    /// Matches client name, space code or space name.
    pub search: Option<String>,
    pub status: Option<AgreementStatus>,
    /// Restricts the listing to one client ("my agreements").
    pub client_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementStats {
    pub total: u64,
    pub by_status: BTreeMap<AgreementStatus, u64>,
    /// Sum of monthly rent over active agreements.
    pub active_monthly_rent: Decimal,
}
