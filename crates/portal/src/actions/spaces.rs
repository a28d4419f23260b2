//! Space actions.
//!
//! Admins manage spaces; customers see the spaces they lease; anyone can
//! browse the catalog of available spaces.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use warehub_core::{Capability, Page, SpaceId, SpaceStatus, WarehouseId};

use super::{ActionError, ActionResult, ListQuery, Listing, Validator, listing_key};
use crate::db::RepositoryError;
use crate::models::{Caller, Space, SpaceDetail, SpaceDraft, SpaceFilter, SpaceStats};
use crate::services::view_cache::{SPACE_DETAIL_VIEWS, SPACE_STATUS_VIEWS, View};
use crate::state::AppState;

const ENTITY: &str = "Space";

pub type SpaceListing = Listing<SpaceDetail, SpaceStats>;

/// Submitted space fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpaceForm {
    pub warehouse_id: String,
    pub code: String,
    pub name: String,
    pub space_type: String,
    pub size: String,
    pub rate: String,
    /// Blank keeps the current status (or `AVAILABLE` for a new space).
    pub status: String,
}

/// A validated form. `status` is `None` when left blank.
#[derive(Debug)]
struct ValidSpace {
    warehouse_id: WarehouseId,
    code: String,
    name: String,
    space_type: String,
    size: Decimal,
    rate: Decimal,
    status: Option<SpaceStatus>,
}

impl ValidSpace {
    fn into_draft(self) -> SpaceDraft {
        SpaceDraft {
            warehouse_id: self.warehouse_id,
            code: self.code,
            name: self.name,
            space_type: self.space_type,
            size: self.size,
            rate: self.rate,
            status: self.status,
        }
    }
}

impl SpaceForm {
    fn validate(&self, creating: bool) -> ActionResult<ValidSpace> {
        let mut v = Validator::new();
        let warehouse_id = v.parse::<WarehouseId>("warehouseId", "Warehouse", &self.warehouse_id);
        let code = v.required("code", "Space code", &self.code).to_uppercase();
        let name = v.required("name", "Name", &self.name);
        let space_type = v.required("spaceType", "Type", &self.space_type);
        let size = v.positive_decimal("size", "Size", &self.size);
        let rate = v.positive_decimal("rate", "Rate", &self.rate);
        let status = v.parse_optional::<SpaceStatus>("status", "Status", &self.status);
        if creating {
            v.check(
                status.is_none_or(|s| matches!(s, SpaceStatus::Available | SpaceStatus::Maintenance)),
                "status",
                "A new space is either available or under maintenance",
            );
        }
        v.finish()?;

        Ok(ValidSpace {
            warehouse_id: warehouse_id.unwrap_or(WarehouseId::new(0)),
            code,
            name,
            space_type,
            size,
            rate,
            status,
        })
    }
}

fn filter_from(query: &ListQuery, v: &mut Validator) -> SpaceFilter {
    SpaceFilter {
        search: query.search(),
        status: v.parse_optional("status", "Status", query.status.as_deref().unwrap_or_default()),
        warehouse_id: v.parse_optional("kind", "Warehouse", query.kind.as_deref().unwrap_or_default()),
    }
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list(state: &AppState, caller: &Caller, query: &ListQuery) -> ActionResult<SpaceListing> {
    caller.require(Capability::ManageInventory)?;

    let mut v = Validator::new();
    let filter = filter_from(query, &mut v);
    v.finish()?;

    let page = query.page_request();
    let db = state.db();
    state
        .views()
        .get_or_load(View::Spaces, listing_key(&filter, page), || async {
            let items = db.spaces().list(&filter, page).await?;
            let stats = db.spaces().stats(&filter).await?;
            Ok::<_, RepositoryError>(Listing { page: items, stats })
        })
        .await
        .map_err(ActionError::from_store(ENTITY))
}

/// Public catalog: available spaces only.
#[instrument(skip(state))]
pub async fn catalog(state: &AppState, query: &ListQuery) -> ActionResult<Page<SpaceDetail>> {
    let mut v = Validator::new();
    let filter = SpaceFilter {
        status: Some(SpaceStatus::Available),
        ..filter_from(query, &mut v)
    };
    v.finish()?;

    let page = query.page_request();
    let db = state.db();
    state
        .views()
        .get_or_load(View::Catalog, listing_key(&filter, page), || {
            db.spaces().list(&filter, page)
        })
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn get(state: &AppState, caller: &Caller, id: SpaceId) -> ActionResult<SpaceDetail> {
    caller.require(Capability::ManageInventory)?;
    state
        .db()
        .spaces()
        .get(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?
        .ok_or(ActionError::NotFound(ENTITY))
}

/// Spaces the customer currently leases.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn mine(state: &AppState, caller: &Caller) -> ActionResult<Vec<SpaceDetail>> {
    caller.require(Capability::ViewOwnLeases)?;
    state
        .db()
        .spaces()
        .list_for_client(caller.id)
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[instrument(skip(state, caller, form), fields(user_id = %caller.id, code = %form.code))]
pub async fn create(state: &AppState, caller: &Caller, form: SpaceForm) -> ActionResult<Space> {
    let draft = form.validate(true)?.into_draft();
    caller.require(Capability::ManageInventory)?;

    let space = state
        .db()
        .spaces()
        .create(draft)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => ActionError::field("warehouseId", "Warehouse not found"),
            other => ActionError::from_store(ENTITY)(other),
        })?;
    state.views().invalidate(SPACE_STATUS_VIEWS);

    tracing::info!(space_id = %space.id, code = %space.code, "Space created");
    Ok(space)
}

/// Replace a space's fields.
///
/// The status may move between available, maintenance and reserved; an
/// occupied space keeps its status until its agreement ends.
#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn update(
    state: &AppState,
    caller: &Caller,
    id: SpaceId,
    form: SpaceForm,
) -> ActionResult<Space> {
    let draft = form.validate(false)?.into_draft();
    caller.require(Capability::ManageInventory)?;

    let space = state
        .db()
        .spaces()
        .update(id, draft)
        .await
        .map_err(|e| match e {
            RepositoryError::InvalidState(message) => ActionError::field("status", message),
            other => ActionError::from_store(ENTITY)(other),
        })?;
    state.views().invalidate(SPACE_DETAIL_VIEWS);

    tracing::info!(space_id = %space.id, status = %space.status, "Space updated");
    Ok(space)
}

/// Delete a space. Refused while any agreement references it.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn delete(state: &AppState, caller: &Caller, id: SpaceId) -> ActionResult<()> {
    caller.require(Capability::ManageInventory)?;

    state
        .db()
        .spaces()
        .delete(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(SPACE_DETAIL_VIEWS);

    tracing::info!(space_id = %id, "Space deleted");
    Ok(())
}
