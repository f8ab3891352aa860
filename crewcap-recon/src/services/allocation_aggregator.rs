//! Allocation aggregation and conflict detection
//!
//! Computes per-member utilization from the current active assignment set.
//! "This week" is the single mutable `hours_this_week` scalar on each
//! assignment, not a dated ledger; the store is a live current-state board.
//! Aggregation is a plain read — it does not need to be transactionally
//! consistent with in-flight reconciliations, because utilization figures
//! are advisory rather than authoritative gates.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use crewcap_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::{assignments, projects, snapshots, team_members};

/// Utilization figures for one team member
#[derive(Debug, Clone, Serialize)]
pub struct MemberUtilization {
    pub team_member_id: Uuid,
    pub full_name: String,
    pub capacity_hours: f64,
    pub allocated_hours: f64,
    pub available_hours: f64,
    /// 0 when capacity is 0, regardless of allocated hours. Policy, not a
    /// bug: a zero-capacity member must never divide by zero nor read as
    /// fully utilized.
    pub utilization_pct: f64,
    pub overallocated: bool,
}

/// A detected overallocation conflict
#[derive(Debug, Clone, Serialize)]
pub struct CapacityConflict {
    pub team_member_id: Uuid,
    pub team_member_name: String,
    pub affected_projects: Vec<String>,
    pub severity: ConflictSeverity,
    pub description: String,
    pub suggested_resolution: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

/// Monday of the week containing `today`
pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(today.weekday().num_days_from_monday() as i64)
}

/// Aggregate current utilization for all active team members
///
/// Sums `hours_this_week` over active assignments per member, derives
/// availability and overallocation, upserts the current-week capacity
/// snapshot, and returns the list sorted by utilization descending.
/// Fails only on storage errors.
pub async fn aggregate(pool: &SqlitePool) -> Result<Vec<MemberUtilization>> {
    let members = team_members::list_team_members(pool, true).await?;
    let active = assignments::list_active(pool, None).await?;

    // Local accumulator, scoped to this call; safe for concurrent callers
    let mut allocated: HashMap<Uuid, f64> = HashMap::new();
    for assignment in &active {
        *allocated.entry(assignment.team_member_id).or_insert(0.0) +=
            assignment.hours_this_week;
    }

    let week = week_start(Utc::now().date_naive()).to_string();

    let mut utilizations = Vec::with_capacity(members.len());
    for member in members {
        let allocated_hours = allocated.get(&member.guid).copied().unwrap_or(0.0);
        let capacity_hours = member.weekly_capacity_hours;
        let utilization_pct = if capacity_hours > 0.0 {
            allocated_hours / capacity_hours * 100.0
        } else {
            0.0
        };

        snapshots::upsert_snapshot(pool, member.guid, &week, capacity_hours, allocated_hours)
            .await?;

        utilizations.push(MemberUtilization {
            team_member_id: member.guid,
            full_name: member.full_name,
            capacity_hours,
            allocated_hours,
            available_hours: capacity_hours - allocated_hours,
            utilization_pct,
            overallocated: allocated_hours > capacity_hours,
        });
    }

    utilizations.sort_by(|a, b| {
        b.utilization_pct
            .partial_cmp(&a.utilization_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    tracing::debug!(
        members = utilizations.len(),
        overallocated = utilizations.iter().filter(|u| u.overallocated).count(),
        "Aggregated weekly utilization"
    );

    Ok(utilizations)
}

/// Detect overallocation conflicts for the current week
///
/// For each overallocated member, reports the affected project names,
/// a severity graded by the size of the overage, and a suggested
/// resolution naming the largest assignment.
pub async fn detect_conflicts(pool: &SqlitePool) -> Result<Vec<CapacityConflict>> {
    let utilizations = aggregate(pool).await?;
    let project_names: HashMap<Uuid, String> = projects::list_projects(pool)
        .await?
        .into_iter()
        .map(|p| (p.guid, p.name))
        .collect();

    let mut conflicts = Vec::new();
    for utilization in utilizations.iter().filter(|u| u.overallocated) {
        let mut member_assignments =
            assignments::list_active(pool, Some(utilization.team_member_id)).await?;
        member_assignments.sort_by(|a, b| {
            b.hours_this_week
                .partial_cmp(&a.hours_this_week)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let affected_projects: Vec<String> = member_assignments
            .iter()
            .filter_map(|a| project_names.get(&a.project_id).cloned())
            .collect();

        let overage = utilization.allocated_hours - utilization.capacity_hours;
        let severity = if overage > 10.0 {
            ConflictSeverity::High
        } else if overage > 5.0 {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::Low
        };

        let suggested_resolution = member_assignments
            .first()
            .and_then(|a| project_names.get(&a.project_id))
            .map(|name| format!("Reduce hours on: {}", name));

        conflicts.push(CapacityConflict {
            team_member_id: utilization.team_member_id,
            team_member_name: utilization.full_name.clone(),
            affected_projects,
            severity,
            description: format!(
                "{} is {:.0}h overallocated this week",
                utilization.full_name, overage
            ),
            suggested_resolution,
        });
    }

    Ok(conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::assignments::{create_assignment, Assignment};
    use crate::db::projects::{create_project, Project};
    use crate::db::team_members::upsert_team_member;
    use crate::db::test_pool;
    use crate::types::AssignmentSource;

    async fn assign(pool: &SqlitePool, member: Uuid, project: Uuid, hours: f64) {
        let mut conn = pool.acquire().await.unwrap();
        let a = Assignment::new(
            member,
            project,
            "team-member".to_string(),
            hours,
            hours,
            AssignmentSource::Manual,
            None,
        );
        create_assignment(&mut conn, &a).await.unwrap();
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2026-08-29 is a Saturday
        let saturday = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        assert_eq!(week_start(saturday), NaiveDate::from_ymd_opt(2026, 8, 24).unwrap());
        let monday = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        assert_eq!(week_start(monday), monday);
    }

    #[tokio::test]
    async fn test_overallocation_with_negative_availability() {
        let pool = test_pool().await;
        let (tom, _) = upsert_team_member(&pool, "Tom Hyde", 8.0).await.unwrap();

        let coke = Project::new("Coke".to_string(), None);
        let legos = Project::new("Legos".to_string(), None);
        create_project(&pool, &coke).await.unwrap();
        create_project(&pool, &legos).await.unwrap();

        assign(&pool, tom, coke.guid, 6.0).await;
        assign(&pool, tom, legos.guid, 4.0).await;

        let result = aggregate(&pool).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].allocated_hours, 10.0);
        assert_eq!(result[0].available_hours, -2.0);
        assert!(result[0].overallocated);
    }

    #[tokio::test]
    async fn test_zero_capacity_reports_zero_utilization() {
        let pool = test_pool().await;
        let (member, _) = upsert_team_member(&pool, "Jess Lucas", 0.0).await.unwrap();
        let project = Project::new("Legos".to_string(), None);
        create_project(&pool, &project).await.unwrap();
        assign(&pool, member, project.guid, 5.0).await;

        let result = aggregate(&pool).await.unwrap();
        assert_eq!(result[0].utilization_pct, 0.0);
        // Hours still counted; only the percentage is pinned
        assert_eq!(result[0].allocated_hours, 5.0);
        assert!(result[0].overallocated);
    }

    #[tokio::test]
    async fn test_ended_assignments_excluded_and_sorted_desc() {
        let pool = test_pool().await;
        let (busy, _) = upsert_team_member(&pool, "Ana Ruiz", 10.0).await.unwrap();
        let (idle, _) = upsert_team_member(&pool, "Ben Ode", 40.0).await.unwrap();

        let project = Project::new("Coke".to_string(), None);
        create_project(&pool, &project).await.unwrap();
        assign(&pool, busy, project.guid, 9.0).await;

        let other = Project::new("Legos".to_string(), None);
        create_project(&pool, &other).await.unwrap();
        assign(&pool, idle, other.guid, 4.0).await;

        // End the idle member's assignment: their allocation drops to zero
        let active = crate::db::assignments::list_active(&pool, Some(idle)).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        crate::db::assignments::end_assignment(&mut conn, active[0].guid)
            .await
            .unwrap();
        drop(conn);

        let result = aggregate(&pool).await.unwrap();
        assert_eq!(result[0].full_name, "Ana Ruiz");
        assert_eq!(result[1].allocated_hours, 0.0);
    }

    #[tokio::test]
    async fn test_conflict_detection_severity_and_suggestion() {
        let pool = test_pool().await;
        let (tom, _) = upsert_team_member(&pool, "Tom Hyde", 8.0).await.unwrap();

        let coke = Project::new("Coke".to_string(), None);
        let legos = Project::new("Legos".to_string(), None);
        create_project(&pool, &coke).await.unwrap();
        create_project(&pool, &legos).await.unwrap();
        assign(&pool, tom, coke.guid, 14.0).await;
        assign(&pool, tom, legos.guid, 6.0).await;

        let conflicts = detect_conflicts(&pool).await.unwrap();
        assert_eq!(conflicts.len(), 1);
        // 20h on an 8h week: 12h over
        assert_eq!(conflicts[0].severity, ConflictSeverity::High);
        assert_eq!(
            conflicts[0].suggested_resolution.as_deref(),
            Some("Reduce hours on: Coke")
        );
        assert_eq!(conflicts[0].affected_projects.len(), 2);
    }
}
