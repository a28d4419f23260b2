//! Public space requests and their review.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use tracing::instrument;

use warehub_core::SpaceRequestId;

use super::{Submitted, respond, respond_created};
use crate::actions::{
    ListQuery, agreements::AgreementForm, space_requests, space_requests::SpaceRequestForm,
};
use crate::middleware::RequireCaller;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/space-requests", post(submit))
        .route("/dashboard/space-requests", get(index))
        .route("/dashboard/space-requests/{id}", get(show))
        .route("/dashboard/space-requests/{id}/approve", post(approve))
        .route("/dashboard/space-requests/{id}/reject", post(reject))
}

#[instrument(skip(state, form))]
async fn submit(State(state): State<AppState>, Submitted(form): Submitted<SpaceRequestForm>) -> Response {
    respond_created(space_requests::submit(&state, form).await)
}

#[instrument(skip(state, caller))]
async fn index(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Query(query): Query<ListQuery>,
) -> Response {
    respond(space_requests::list(&state, &caller, &query).await)
}

#[instrument(skip(state, caller))]
async fn show(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<SpaceRequestId>,
) -> Response {
    respond(space_requests::get(&state, &caller, id).await)
}

#[instrument(skip(state, caller, form))]
async fn approve(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<SpaceRequestId>,
    Submitted(form): Submitted<AgreementForm>,
) -> Response {
    respond(space_requests::approve(&state, &caller, id, form).await)
}

#[instrument(skip(state, caller))]
async fn reject(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<SpaceRequestId>,
) -> Response {
    respond(space_requests::reject(&state, &caller, id).await)
}
