//! Warehouse actions (admin only).

use serde::Deserialize;
use tracing::instrument;

use warehub_core::{Capability, StorageType, UserId, WarehouseId};

use super::{ActionError, ActionResult, ListQuery, Listing, Validator, listing_key};
use crate::db::RepositoryError;
use crate::models::{Caller, Warehouse, WarehouseDraft, WarehouseFilter, WarehouseStats, WarehouseSummary};
use crate::services::View;
use crate::services::view_cache::SPACE_DETAIL_VIEWS;
use crate::state::AppState;

const ENTITY: &str = "Warehouse";

pub type WarehouseListing = Listing<WarehouseSummary, WarehouseStats>;

/// Submitted warehouse fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WarehouseForm {
    pub code: String,
    pub name: String,
    pub location: String,
    pub storage_type: String,
    pub capacity: String,
    /// Blank means the caller manages the warehouse.
    pub manager_id: String,
    pub description: String,
}

impl WarehouseForm {
    fn validate(&self, caller: &Caller) -> ActionResult<WarehouseDraft> {
        let mut v = Validator::new();
        let code = v.required("code", "Code", &self.code).to_uppercase();
        let name = v.required("name", "Name", &self.name);
        let location = v.required("location", "Location", &self.location);
        let storage_type =
            v.parse::<StorageType>("storageType", "Storage type", &self.storage_type);
        let capacity = v.positive_int("capacity", "Capacity", &self.capacity);
        let manager_id = v
            .parse_optional::<UserId>("managerId", "Manager", &self.manager_id)
            .unwrap_or(caller.id);
        let description = v.optional("description", "Description", &self.description);
        v.finish()?;

        Ok(WarehouseDraft {
            code,
            name,
            location,
            storage_type: storage_type.unwrap_or(StorageType::Ambient),
            capacity,
            manager_id,
            description,
        })
    }
}

/// Map a store failure on write, pointing a missing manager at its field.
fn write_error(error: RepositoryError) -> ActionError {
    match error {
        RepositoryError::NotFound => ActionError::field("managerId", "Manager not found"),
        other => ActionError::from_store(ENTITY)(other),
    }
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn list(state: &AppState, caller: &Caller, query: &ListQuery) -> ActionResult<WarehouseListing> {
    caller.require(Capability::ManageInventory)?;

    let mut v = Validator::new();
    let filter = WarehouseFilter {
        search: query.search(),
        storage_type: v.parse_optional("kind", "Storage type", query.kind.as_deref().unwrap_or_default()),
    };
    v.finish()?;

    let page = query.page_request();
    let db = state.db();
    state
        .views()
        .get_or_load(View::Warehouses, listing_key(&filter, page), || async {
            let items = db.warehouses().list(&filter, page).await?;
            let stats = db.warehouses().stats().await?;
            Ok::<_, RepositoryError>(Listing { page: items, stats })
        })
        .await
        .map_err(ActionError::from_store(ENTITY))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn get(state: &AppState, caller: &Caller, id: WarehouseId) -> ActionResult<WarehouseSummary> {
    caller.require(Capability::ManageInventory)?;
    state
        .db()
        .warehouses()
        .get(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?
        .ok_or(ActionError::NotFound(ENTITY))
}

#[instrument(skip(state, caller, form), fields(user_id = %caller.id, code = %form.code))]
pub async fn create(state: &AppState, caller: &Caller, form: WarehouseForm) -> ActionResult<Warehouse> {
    let draft = form.validate(caller)?;
    caller.require(Capability::ManageInventory)?;

    let warehouse = state
        .db()
        .warehouses()
        .create(draft)
        .await
        .map_err(write_error)?;
    state.views().invalidate(&[View::Warehouses, View::Analytics]);

    tracing::info!(warehouse_id = %warehouse.id, code = %warehouse.code, "Warehouse created");
    Ok(warehouse)
}

#[instrument(skip(state, caller, form), fields(user_id = %caller.id))]
pub async fn update(
    state: &AppState,
    caller: &Caller,
    id: WarehouseId,
    form: WarehouseForm,
) -> ActionResult<Warehouse> {
    let draft = form.validate(caller)?;
    caller.require(Capability::ManageInventory)?;

    let warehouse = state
        .db()
        .warehouses()
        .update(id, draft)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => ActionError::NotFound(ENTITY),
            other => write_error(other),
        })?;
    state.views().invalidate(SPACE_DETAIL_VIEWS);

    tracing::info!(warehouse_id = %warehouse.id, "Warehouse updated");
    Ok(warehouse)
}

/// Delete a warehouse and its spaces.
///
/// Refused while any of its spaces is occupied or reserved.
#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn delete(state: &AppState, caller: &Caller, id: WarehouseId) -> ActionResult<()> {
    caller.require(Capability::ManageInventory)?;

    state
        .db()
        .warehouses()
        .delete(id)
        .await
        .map_err(ActionError::from_store(ENTITY))?;
    state.views().invalidate(SPACE_DETAIL_VIEWS);

    tracing::info!(warehouse_id = %id, "Warehouse deleted");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use warehub_core::Role;

    use super::*;

    fn admin() -> Caller {
        Caller {
            id: UserId::new(9),
            role: Role::Admin,
            name: "Ops".to_owned(),
            email: "ops@warehub.test".to_owned(),
        }
    }

    fn form() -> WarehouseForm {
        WarehouseForm {
            code: "wh-north".to_owned(),
            name: "North".to_owned(),
            location: "Leeds".to_owned(),
            storage_type: "ambient".to_owned(),
            capacity: "250".to_owned(),
            ..WarehouseForm::default()
        }
    }

    #[test]
    fn test_form_is_coerced() {
        let draft = form().validate(&admin()).unwrap();
        assert_eq!(draft.code, "WH-NORTH");
        assert_eq!(draft.capacity, 250);
        assert_eq!(draft.storage_type, StorageType::Ambient);
        assert_eq!(draft.manager_id, UserId::new(9));
        assert_eq!(draft.description, None);
    }

    #[test]
    fn test_negative_capacity_is_a_field_error() {
        let form = WarehouseForm {
            capacity: "-1".to_owned(),
            ..form()
        };
        let Err(ActionError::Validation(errors)) = form.validate(&admin()) else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("capacity"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_unknown_storage_type_is_rejected() {
        let form = WarehouseForm {
            storage_type: "underwater".to_owned(),
            ..form()
        };
        assert!(matches!(form.validate(&admin()), Err(ActionError::Validation(_))));
    }
}
