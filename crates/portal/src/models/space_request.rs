//! Public requests to rent an available space.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehub_core::{AgreementId, Email, SpaceId, SpaceRequestId, SpaceRequestStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceRequest {
    pub id: SpaceRequestId,
    pub space_id: SpaceId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub message: Option<String>,
    pub status: SpaceRequestStatus,
    /// The agreement created when the request was approved.
    pub agreement_id: Option<AgreementId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSpaceRequest {
    pub space_id: SpaceId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceRequestDetail {
    #[serde(flatten)]
    pub request: SpaceRequest,
    pub space_code: String,
    pub space_name: String,
    pub warehouse_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SpaceRequestFilter {
    /// Matches requester name, email or company.
    pub search: Option<String>,
    pub status: Option<SpaceRequestStatus>,
}
