//! Agreement route handlers (admin) and the customer's own agreements.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use tracing::instrument;

use warehub_core::AgreementId;

use super::{Submitted, respond, respond_created, respond_done};
use crate::actions::{ListQuery, agreements, agreements::AgreementForm};
use crate::middleware::RequireCaller;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/agreements", get(index).post(create))
        .route("/dashboard/agreements/{id}", get(show).post(update))
        .route("/dashboard/agreements/{id}/delete", post(delete))
        .route("/dashboard/my-agreements", get(mine))
        .route("/dashboard/my-agreements/{id}", get(show))
}

#[instrument(skip(state, caller))]
async fn index(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Query(query): Query<ListQuery>,
) -> Response {
    respond(agreements::list(&state, &caller, &query).await)
}

#[instrument(skip(state, caller))]
async fn mine(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Query(query): Query<ListQuery>,
) -> Response {
    respond(agreements::mine(&state, &caller, &query).await)
}

#[instrument(skip(state, caller))]
async fn show(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<AgreementId>,
) -> Response {
    respond(agreements::get(&state, &caller, id).await)
}

#[instrument(skip(state, caller, form))]
async fn create(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Submitted(form): Submitted<AgreementForm>,
) -> Response {
    respond_created(agreements::create(&state, &caller, form).await)
}

#[instrument(skip(state, caller, form))]
async fn update(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<AgreementId>,
    Submitted(form): Submitted<AgreementForm>,
) -> Response {
    respond(agreements::update(&state, &caller, id, form).await)
}

#[instrument(skip(state, caller))]
async fn delete(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<AgreementId>,
) -> Response {
    respond_done(agreements::delete(&state, &caller, id).await)
}
