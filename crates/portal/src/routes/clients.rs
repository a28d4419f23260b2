//! Client management, staff provisioning and the caller's own profile.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use tracing::instrument;

use warehub_core::UserId;

use super::{Submitted, respond, respond_created, respond_done};
use crate::actions::{
    ListQuery, StatusForm, clients,
    clients::{AccountForm, PasswordForm, ProfileForm},
};
use crate::middleware::RequireCaller;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/clients", get(index).post(create))
        .route("/dashboard/clients/{id}", get(show).post(update))
        .route("/dashboard/clients/{id}/status", post(set_status))
        .route("/dashboard/clients/{id}/delete", post(delete))
        .route("/api/admin/users", post(create_admin))
        .route("/dashboard/profile", get(profile).post(update_profile))
        .route("/dashboard/profile/password", post(change_password))
}

#[instrument(skip(state, caller))]
async fn index(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Query(query): Query<ListQuery>,
) -> Response {
    respond(clients::list(&state, &caller, &query).await)
}

#[instrument(skip(state, caller))]
async fn show(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<UserId>,
) -> Response {
    respond(clients::get(&state, &caller, id).await)
}

#[instrument(skip(state, caller, form))]
async fn create(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Submitted(form): Submitted<AccountForm>,
) -> Response {
    respond_created(clients::create(&state, &caller, form).await)
}

#[instrument(skip(state, caller, form))]
async fn update(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<UserId>,
    Submitted(form): Submitted<ProfileForm>,
) -> Response {
    respond(clients::update(&state, &caller, id, form).await)
}

#[instrument(skip(state, caller, form))]
async fn set_status(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<UserId>,
    Submitted(form): Submitted<StatusForm>,
) -> Response {
    respond(clients::set_status(&state, &caller, id, form).await)
}

#[instrument(skip(state, caller))]
async fn delete(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<UserId>,
) -> Response {
    respond_done(clients::delete(&state, &caller, id).await)
}

#[instrument(skip(state, caller, form))]
async fn create_admin(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Submitted(form): Submitted<AccountForm>,
) -> Response {
    respond_created(clients::create_admin(&state, &caller, form).await)
}

// =============================================================================
// Own profile
// =============================================================================

#[instrument(skip(state, caller))]
async fn profile(State(state): State<AppState>, RequireCaller(caller): RequireCaller) -> Response {
    respond(clients::profile(&state, &caller).await)
}

#[instrument(skip(state, caller, form))]
async fn update_profile(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Submitted(form): Submitted<ProfileForm>,
) -> Response {
    respond(clients::update_profile(&state, &caller, form).await)
}

#[instrument(skip(state, caller, form))]
async fn change_password(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Submitted(form): Submitted<PasswordForm>,
) -> Response {
    respond_done(clients::change_password(&state, &caller, form).await)
}
