//! Forecast spreadsheet import adapter
//!
//! Consumes row-oriented records already parsed out of the forecasting
//! spreadsheet (CSV mechanics live with the caller). Team rows upsert
//! team members keyed on exact canonical name — the only path that creates
//! members from external data. Allocation rows become desired assignments:
//! the first week column is "this week", the sum of all week columns is the
//! estimate, and zero-hour rows are skipped rather than errored.

use chrono::NaiveDate;
use crewcap_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use crate::db::team_members;
use crate::services::ReconciliationEngine;
use crate::types::{
    AssignmentSource, DesiredAssignment, EntityRef, ReconcileScope, ReconciliationResult,
};

/// Default weekly capacity when a team row's Capacity cell is missing
const DEFAULT_CAPACITY_HOURS: f64 = 38.0;

/// One spreadsheet row: named columns plus `YYYY-MM-DD` week columns.
/// `BTreeMap` keeps week columns in chronological order (ISO dates sort
/// lexicographically).
pub type ImportRow = BTreeMap<String, String>;

/// Import request: one sheet of people, one sheet of allocations
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastImportRequest {
    #[serde(default)]
    pub team_rows: Vec<ImportRow>,
    #[serde(default)]
    pub allocation_rows: Vec<ImportRow>,
}

/// Outcome of one import run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub members_created: usize,
    pub members_updated: usize,
    pub reconciliation: ReconciliationResult,
}

fn cell<'a>(row: &'a ImportRow, key: &str) -> Option<&'a str> {
    row.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Week columns are headers that parse as ISO dates
fn week_hours(row: &ImportRow) -> Vec<f64> {
    row.iter()
        .filter(|(key, _)| NaiveDate::parse_from_str(key, "%Y-%m-%d").is_ok())
        .map(|(_, value)| value.trim().parse::<f64>().unwrap_or(0.0))
        .collect()
}

/// Run a forecast import: upsert members, then reconcile allocations
/// unscoped (an import is a partial view of reality and never ends
/// assignments it does not mention).
pub async fn apply_forecast_import(
    pool: &SqlitePool,
    request: ForecastImportRequest,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    // Pass 1: team members, keyed on exact canonical name
    for row in &request.team_rows {
        let Some(full_name) = cell(row, "Person") else {
            continue;
        };
        let capacity = cell(row, "Capacity")
            .and_then(|c| c.parse::<f64>().ok())
            .unwrap_or(DEFAULT_CAPACITY_HOURS);

        let (_, created) = team_members::upsert_team_member(pool, full_name, capacity).await?;
        if created {
            summary.members_created += 1;
        } else {
            summary.members_updated += 1;
        }
    }

    // Pass 2: allocations
    let mut desired = Vec::new();
    let mut zero_hour_rows = 0usize;
    for row in &request.allocation_rows {
        let Some(person) = cell(row, "Person") else {
            continue;
        };
        let Some(project) = cell(row, "Project") else {
            continue;
        };

        let weeks = week_hours(row);
        let hours_this_week = weeks.first().copied().unwrap_or(0.0);
        if hours_this_week == 0.0 {
            // Future-only rows are expected in a forecast; not an error
            zero_hour_rows += 1;
            continue;
        }
        let estimated_total_hours: f64 = weeks.iter().sum();

        let role = cell(row, "Roles")
            .and_then(|r| r.split(',').next())
            .map(|r| r.trim().to_string())
            .unwrap_or_else(|| "team-member".to_string());

        desired.push(DesiredAssignment {
            member: EntityRef::Name(person.to_string()),
            project: EntityRef::Name(project.to_string()),
            client: cell(row, "Client").map(str::to_string),
            role,
            hours_this_week,
            estimated_total_hours,
            source: AssignmentSource::Import,
            confidence: Some(1.0),
        });
    }

    summary.reconciliation = ReconciliationEngine::new(pool.clone())
        .reconcile(ReconcileScope::Unscoped, desired)
        .await?;
    summary.reconciliation.skipped += zero_hour_rows;

    tracing::info!(
        members_created = summary.members_created,
        members_updated = summary.members_updated,
        assignments_created = summary.reconciliation.created,
        zero_hour_rows,
        "Forecast import complete"
    );

    Ok(summary)
}
