//! Dashboard aggregates (admin only).

use serde::Deserialize;
use tracing::instrument;

use warehub_core::Capability;

use super::{ActionError, ActionResult};
use crate::models::{BusinessTypeCount, Caller, DashboardOverview, MonthlyRevenue, WarehouseOccupancy};
use crate::services::View;
use crate::state::AppState;

const ENTITY: &str = "Analytics";

/// Default and largest revenue window, in months.
pub const DEFAULT_REVENUE_MONTHS: u32 = 12;
pub const MAX_REVENUE_MONTHS: u32 = 60;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct RevenueQuery {
    pub months: Option<u32>,
}

impl RevenueQuery {
    #[must_use]
    pub fn months(self) -> u32 {
        self.months
            .unwrap_or(DEFAULT_REVENUE_MONTHS)
            .clamp(1, MAX_REVENUE_MONTHS)
    }
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn revenue(state: &AppState, caller: &Caller, query: RevenueQuery) -> ActionResult<Vec<MonthlyRevenue>> {
    caller.require(Capability::ViewAnalytics)?;
    let months = query.months();
    let db = state.db();
    state
        .views()
        .get_or_load(View::Analytics, format!("revenue|{months}"), || {
            db.analytics().revenue_by_month(months)
        })
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn occupancy(state: &AppState, caller: &Caller) -> ActionResult<Vec<WarehouseOccupancy>> {
    caller.require(Capability::ViewAnalytics)?;
    let db = state.db();
    state
        .views()
        .get_or_load(View::Analytics, "occupancy".to_owned(), || db.analytics().occupancy())
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn business_types(state: &AppState, caller: &Caller) -> ActionResult<Vec<BusinessTypeCount>> {
    caller.require(Capability::ViewAnalytics)?;
    let db = state.db();
    state
        .views()
        .get_or_load(View::Analytics, "business-types".to_owned(), || {
            db.analytics().clients_by_business_type()
        })
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn overview(state: &AppState, caller: &Caller) -> ActionResult<DashboardOverview> {
    caller.require(Capability::ViewAnalytics)?;
    let db = state.db();
    state
        .views()
        .get_or_load(View::Analytics, "overview".to_owned(), || db.analytics().overview())
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revenue_window_is_bounded() {
        assert_eq!(RevenueQuery::default().months(), 12);
        assert_eq!(RevenueQuery { months: Some(0) }.months(), 1);
        assert_eq!(RevenueQuery { months: Some(600) }.months(), 60);
    }
}
