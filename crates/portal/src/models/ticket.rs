//! Customer support tickets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehub_core::{SpaceId, TicketCategory, TicketId, TicketPriority, TicketStatus, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub id: TicketId,
    pub client_id: UserId,
    pub space_id: Option<SpaceId>,
    pub subject: String,
    pub message: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub attachment_url: Option<String>,
    pub resolution: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub client_id: UserId,
    pub space_id: Option<SpaceId>,
    pub subject: String,
    pub message: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub attachment_url: Option<String>,
}

/// Admin triage changes. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketChanges {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: SupportTicket,
    pub client_name: String,
    pub space_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct TicketFilter {
    /// Matches subject or message.
    pub search: Option<String>,
    pub status: Option<TicketStatus>,
    pub category: Option<TicketCategory>,
    /// Restricts the listing to one client.
    pub client_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total: u64,
    pub by_status: BTreeMap<TicketStatus, u64>,
    pub by_category: BTreeMap<TicketCategory, u64>,
}
