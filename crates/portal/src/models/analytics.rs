//! Aggregates for the admin dashboard and analytics endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use warehub_core::WarehouseId;

/// Paid invoice revenue for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    /// `YYYY-MM`.
    pub month: String,
    pub total: Decimal,
    pub invoice_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseOccupancy {
    pub warehouse_id: WarehouseId,
    pub warehouse_name: String,
    pub total_spaces: u64,
    pub occupied_spaces: u64,
    /// `occupied_spaces / total_spaces`, 0 for a warehouse without spaces.
    pub occupancy_rate: f64,
}

impl WarehouseOccupancy {
    #[must_use]
    pub fn new(
        warehouse_id: WarehouseId,
        warehouse_name: String,
        total_spaces: u64,
        occupied_spaces: u64,
    ) -> Self {
        #[allow(clippy::cast_precision_loss)] // space counts are far below 2^52
        let occupancy_rate = if total_spaces == 0 {
            0.0
        } else {
            occupied_spaces as f64 / total_spaces as f64
        };
        Self {
            warehouse_id,
            warehouse_name,
            total_spaces,
            occupied_spaces,
            occupancy_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessTypeCount {
    /// `"Unspecified"` for clients without a business type.
    pub business_type: String,
    pub clients: u64,
}

/// Headline counts for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub warehouses: u64,
    pub spaces: u64,
    pub available_spaces: u64,
    pub clients: u64,
    pub pending_clients: u64,
    pub active_agreements: u64,
    pub open_tickets: u64,
    pub pending_invoices: u64,
    pub pending_space_requests: u64,
}
