//! Manual bulk-entry endpoint

use axum::{extract::State, routing::post, Json, Router};

use crate::error::{ApiError, ApiResult};
use crate::ingest::bulk_entry::{apply_bulk_entry, BulkEntryRequest};
use crate::types::ReconciliationResult;
use crate::AppState;

/// POST /assignments/bulk
///
/// Accepts the complete target assignment state for one team member and
/// reconciles the store to match it.
pub async fn bulk_assignments(
    State(state): State<AppState>,
    Json(request): Json<BulkEntryRequest>,
) -> ApiResult<Json<ReconciliationResult>> {
    // Reject unknown and deactivated members up front with a 404 rather
    // than a per-item error; the editor only operates on the active set
    let member = crate::db::team_members::load_team_member(&state.db, request.team_member_id)
        .await?;
    if !member.map_or(false, |m| m.active) {
        return Err(ApiError::NotFound(format!(
            "Team member not found: {}",
            request.team_member_id
        )));
    }

    let result = apply_bulk_entry(&state.db, request).await?;
    Ok(Json(result))
}

/// Build assignment routes
pub fn assignment_routes() -> Router<AppState> {
    Router::new().route("/assignments/bulk", post(bulk_assignments))
}
