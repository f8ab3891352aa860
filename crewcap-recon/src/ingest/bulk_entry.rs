//! Manual bulk-entry adapter
//!
//! The editor screen submits the complete target state for one team member;
//! reconciliation is scoped to that member, so assignments the user removed
//! from the screen are ended.

use crewcap_common::Result;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::services::ReconciliationEngine;
use crate::types::{
    AssignmentSource, DesiredAssignment, EntityRef, ReconcileScope, ReconciliationResult,
};

/// One row of the bulk-entry screen
#[derive(Debug, Clone, Deserialize)]
pub struct BulkEntryItem {
    pub project_id: Uuid,
    #[serde(default = "default_role")]
    pub role: String,
    pub hours_this_week: f64,
}

fn default_role() -> String {
    "team-member".to_string()
}

/// The complete on-screen state for one team member
#[derive(Debug, Clone, Deserialize)]
pub struct BulkEntryRequest {
    pub team_member_id: Uuid,
    pub assignments: Vec<BulkEntryItem>,
}

/// Apply a bulk-entry submission as a member-scoped reconciliation
pub async fn apply_bulk_entry(
    pool: &SqlitePool,
    request: BulkEntryRequest,
) -> Result<ReconciliationResult> {
    let desired: Vec<DesiredAssignment> = request
        .assignments
        .into_iter()
        .map(|item| DesiredAssignment {
            member: EntityRef::Id(request.team_member_id),
            project: EntityRef::Id(item.project_id),
            client: None,
            role: item.role,
            // Manual entry has no separate estimate column; the week's
            // hours stand in for it, as the editor always has.
            hours_this_week: item.hours_this_week,
            estimated_total_hours: item.hours_this_week,
            source: AssignmentSource::Manual,
            confidence: None,
        })
        .collect();

    ReconciliationEngine::new(pool.clone())
        .reconcile(ReconcileScope::TeamMember(request.team_member_id), desired)
        .await
}
