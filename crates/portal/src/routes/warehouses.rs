//! Warehouse route handlers.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use tracing::instrument;

use warehub_core::WarehouseId;

use super::{Submitted, respond, respond_created, respond_done};
use crate::actions::{ListQuery, warehouses, warehouses::WarehouseForm};
use crate::middleware::RequireCaller;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/warehouses", get(index).post(create))
        .route("/dashboard/warehouses/{id}", get(show).post(update))
        .route("/dashboard/warehouses/{id}/delete", post(delete))
}

#[instrument(skip(state, caller))]
async fn index(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Query(query): Query<ListQuery>,
) -> Response {
    respond(warehouses::list(&state, &caller, &query).await)
}

#[instrument(skip(state, caller))]
async fn show(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<WarehouseId>,
) -> Response {
    respond(warehouses::get(&state, &caller, id).await)
}

#[instrument(skip(state, caller, form))]
async fn create(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Submitted(form): Submitted<WarehouseForm>,
) -> Response {
    respond_created(warehouses::create(&state, &caller, form).await)
}

#[instrument(skip(state, caller, form))]
async fn update(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<WarehouseId>,
    Submitted(form): Submitted<WarehouseForm>,
) -> Response {
    respond(warehouses::update(&state, &caller, id, form).await)
}

#[instrument(skip(state, caller))]
async fn delete(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<WarehouseId>,
) -> Response {
    respond_done(warehouses::delete(&state, &caller, id).await)
}
