//! Dashboard overview and analytics endpoints.

use axum::{
    Router,
    extract::{Query, State},
    response::Response,
    routing::get,
};
use tracing::instrument;

use super::respond;
use crate::actions::{analytics, analytics::RevenueQuery};
use crate::middleware::RequireCaller;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(overview))
        .route("/api/analytics/overview", get(overview))
        .route("/api/analytics/revenue", get(revenue))
        .route("/api/analytics/occupancy", get(occupancy))
        .route("/api/analytics/business-types", get(business_types))
}

#[instrument(skip(state, caller))]
async fn overview(State(state): State<AppState>, RequireCaller(caller): RequireCaller) -> Response {
    respond(analytics::overview(&state, &caller).await)
}

#[instrument(skip(state, caller))]
async fn revenue(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Query(query): Query<RevenueQuery>,
) -> Response {
    respond(analytics::revenue(&state, &caller, query).await)
}

#[instrument(skip(state, caller))]
async fn occupancy(State(state): State<AppState>, RequireCaller(caller): RequireCaller) -> Response {
    respond(analytics::occupancy(&state, &caller).await)
}

#[instrument(skip(state, caller))]
async fn business_types(State(state): State<AppState>, RequireCaller(caller): RequireCaller) -> Response {
    respond(analytics::business_types(&state, &caller).await)
}
