//! Space route handlers, the customer's leased spaces and the public
//! catalog.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use tracing::instrument;

use warehub_core::SpaceId;

use super::{Submitted, respond, respond_created, respond_done};
use crate::actions::{ListQuery, spaces, spaces::SpaceForm};
use crate::middleware::RequireCaller;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/spaces/available", get(catalog))
        .route("/dashboard/my-spaces", get(mine))
        .route("/dashboard/spaces", get(index).post(create))
        .route("/dashboard/spaces/{id}", get(show).post(update))
        .route("/dashboard/spaces/{id}/delete", post(delete))
}

#[instrument(skip(state))]
async fn catalog(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    respond(spaces::catalog(&state, &query).await)
}

#[instrument(skip(state, caller))]
async fn mine(State(state): State<AppState>, RequireCaller(caller): RequireCaller) -> Response {
    respond(spaces::mine(&state, &caller).await)
}

#[instrument(skip(state, caller))]
async fn index(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Query(query): Query<ListQuery>,
) -> Response {
    respond(spaces::list(&state, &caller, &query).await)
}

#[instrument(skip(state, caller))]
async fn show(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<SpaceId>,
) -> Response {
    respond(spaces::get(&state, &caller, id).await)
}

#[instrument(skip(state, caller, form))]
async fn create(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Submitted(form): Submitted<SpaceForm>,
) -> Response {
    respond_created(spaces::create(&state, &caller, form).await)
}

#[instrument(skip(state, caller, form))]
async fn update(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<SpaceId>,
    Submitted(form): Submitted<SpaceForm>,
) -> Response {
    respond(spaces::update(&state, &caller, id, form).await)
}

#[instrument(skip(state, caller))]
async fn delete(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<SpaceId>,
) -> Response {
    respond_done(spaces::delete(&state, &caller, id).await)
}
