//! Warehouses and their listing views.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehub_core::{SpaceStatus, StorageType, UserId, WarehouseId};

/// A warehouse site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub id: WarehouseId,
    /// Unique short code, e.g. `WH-NORTH`.
    pub code: String,
    pub name: String,
    pub location: String,
    pub storage_type: StorageType,
    /// Capacity in square feet.
    pub capacity: i32,
    pub manager_id: UserId,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating or replacing a warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseDraft {
    pub code: String,
    pub name: String,
    pub location: String,
    pub storage_type: StorageType,
    pub capacity: i32,
    pub manager_id: UserId,
    pub description: Option<String>,
}

/// A warehouse with its manager name and space counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseSummary {
    #[serde(flatten)]
    pub warehouse: Warehouse,
    pub manager_name: String,
    pub space_count: u64,
    pub occupied_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct WarehouseFilter {
    /// Matches code, name or location.
    pub search: Option<String>,
    pub storage_type: Option<StorageType>,
}

/// Totals shown above the warehouse table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseStats {
    pub total: u64,
    pub total_capacity: i64,
    pub spaces_by_status: BTreeMap<SpaceStatus, u64>,
}
