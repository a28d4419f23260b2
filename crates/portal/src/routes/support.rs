//! Support ticket route handlers.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use tracing::instrument;

use warehub_core::TicketId;

use super::{Submitted, WithAttachment, respond, respond_created, respond_done};
use crate::actions::{
    ListQuery, support,
    support::{ResolveForm, TicketForm, TriageForm},
};
use crate::middleware::RequireCaller;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/support", get(index).post(create))
        .route("/dashboard/support/{id}", get(show).post(update))
        .route("/dashboard/support/{id}/delete", post(delete))
        .route("/api/support/{id}/resolve", post(resolve))
}

#[instrument(skip(state, caller))]
async fn index(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Query(query): Query<ListQuery>,
) -> Response {
    respond(support::list(&state, &caller, &query).await)
}

#[instrument(skip(state, caller))]
async fn show(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<TicketId>,
) -> Response {
    respond(support::get(&state, &caller, id).await)
}

#[instrument(skip(state, caller, submitted))]
async fn create(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    submitted: WithAttachment<TicketForm>,
) -> Response {
    respond_created(support::create(&state, &caller, submitted.form, submitted.attachment).await)
}

#[instrument(skip(state, caller, form))]
async fn update(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<TicketId>,
    Submitted(form): Submitted<TriageForm>,
) -> Response {
    respond(support::update(&state, &caller, id, form).await)
}

#[instrument(skip(state, caller, form))]
async fn resolve(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<TicketId>,
    Submitted(form): Submitted<ResolveForm>,
) -> Response {
    respond(support::resolve(&state, &caller, id, form).await)
}

#[instrument(skip(state, caller))]
async fn delete(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<TicketId>,
) -> Response {
    respond_done(support::delete(&state, &caller, id).await)
}
