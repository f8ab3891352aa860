//! Capacity aggregation endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::ApiResult;
use crate::services::allocation_aggregator::{self, CapacityConflict, MemberUtilization};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CapacityResponse {
    pub members: Vec<MemberUtilization>,
}

#[derive(Debug, Serialize)]
pub struct ConflictsResponse {
    pub conflicts: Vec<CapacityConflict>,
}

/// GET /capacity
///
/// Current-week utilization for all active team members, sorted by
/// utilization descending.
pub async fn get_capacity(State(state): State<AppState>) -> ApiResult<Json<CapacityResponse>> {
    let members = allocation_aggregator::aggregate(&state.db).await?;
    Ok(Json(CapacityResponse { members }))
}

/// GET /capacity/conflicts
pub async fn get_conflicts(State(state): State<AppState>) -> ApiResult<Json<ConflictsResponse>> {
    let conflicts = allocation_aggregator::detect_conflicts(&state.db).await?;
    Ok(Json(ConflictsResponse { conflicts }))
}

/// Build capacity routes
pub fn capacity_routes() -> Router<AppState> {
    Router::new()
        .route("/capacity", get(get_capacity))
        .route("/capacity/conflicts", get(get_conflicts))
}
