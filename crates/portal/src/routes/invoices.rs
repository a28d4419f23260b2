//! Invoice route handlers. Customers reach the same paths and see only
//! their own invoices.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use tracing::instrument;

use warehub_core::InvoiceId;

use super::{Submitted, WithAttachment, respond, respond_created, respond_done};
use crate::actions::{ListQuery, StatusForm, invoices, invoices::InvoiceForm};
use crate::middleware::RequireCaller;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/invoices", get(index).post(create))
        .route("/dashboard/invoices/{id}", get(show))
        .route("/dashboard/invoices/{id}/status", post(set_status))
        .route("/dashboard/invoices/{id}/delete", post(delete))
}

#[instrument(skip(state, caller))]
async fn index(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Query(query): Query<ListQuery>,
) -> Response {
    respond(invoices::list(&state, &caller, &query).await)
}

#[instrument(skip(state, caller))]
async fn show(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<InvoiceId>,
) -> Response {
    respond(invoices::get(&state, &caller, id).await)
}

#[instrument(skip(state, caller, submitted))]
async fn create(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    submitted: WithAttachment<InvoiceForm>,
) -> Response {
    respond_created(invoices::create(&state, &caller, submitted.form, submitted.attachment).await)
}

#[instrument(skip(state, caller, form))]
async fn set_status(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<InvoiceId>,
    Submitted(form): Submitted<StatusForm>,
) -> Response {
    respond(invoices::set_status(&state, &caller, id, form).await)
}

#[instrument(skip(state, caller))]
async fn delete(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<InvoiceId>,
) -> Response {
    respond_done(invoices::delete(&state, &caller, id).await)
}
