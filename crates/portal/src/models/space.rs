//! Rentable spaces inside a warehouse.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use warehub_core::{SpaceId, SpaceStatus, WarehouseId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: SpaceId,
    pub warehouse_id: WarehouseId,
    /// Unique space code, e.g. `A-101`.
    pub code: String,
    pub name: String,
    /// Free-text kind of space (pallet bay, cage, dock unit...).
    pub space_type: String,
    /// Floor area in square feet.
    pub size: Decimal,
    /// Monthly rate.
    pub rate: Decimal,
    pub status: SpaceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating or replacing a space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceDraft {
    pub warehouse_id: WarehouseId,
    pub code: String,
    pub name: String,
    pub space_type: String,
    pub size: Decimal,
    pub rate: Decimal,
    /// `None` keeps the current status on update; new spaces start `AVAILABLE`.
    pub status: Option<SpaceStatus>,
}

/// A space with the warehouse it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceDetail {
    #[serde(flatten)]
    pub space: Space,
    pub warehouse_name: String,
    pub warehouse_location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SpaceFilter {
    /// Matches code, name or space type.
    pub search: Option<String>,
    pub status: Option<SpaceStatus>,
    pub warehouse_id: Option<WarehouseId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceStats {
    pub total: u64,
    pub by_status: BTreeMap<SpaceStatus, u64>,
}
