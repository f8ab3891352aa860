//! Reconciliation engine
//!
//! Single entry point for every write path that merges proposed assignment
//! facts into the entity store: manual bulk entry, spreadsheet import and
//! approved transcript extractions all build a `Vec<DesiredAssignment>` and
//! call [`ReconciliationEngine::reconcile`]. The engine resolves references,
//! diffs against current state and applies creates/updates/ends as one
//! atomic unit, so the one-active-assignment-per-(member, project) invariant
//! is enforced in exactly one place.

use crewcap_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::assignments::{self, Assignment};
use crate::db::projects::{self, Project};
use crate::db::team_members;
use crate::services::identity_resolver::IdentityResolver;
use crate::types::{
    AssignmentSource, DesiredAssignment, EntityRef, ReconcileScope, ReconciliationResult,
};

/// A desired item with both references resolved to canonical ids
#[derive(Debug, Clone)]
struct ResolvedItem {
    member_id: Uuid,
    project_id: Uuid,
    role: String,
    hours_this_week: f64,
    estimated_total_hours: f64,
    source: AssignmentSource,
    confidence: Option<f64>,
}

/// Reconciliation engine over the entity store
pub struct ReconciliationEngine {
    db: SqlitePool,
    /// Test-only: rows committed by a contending writer after the diff
    /// snapshot is taken. One row is drained per apply pass.
    #[cfg(test)]
    contending_writes: std::sync::Mutex<Vec<Assignment>>,
}

impl ReconciliationEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            #[cfg(test)]
            contending_writes: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Merge a batch of desired assignment facts into the store
    ///
    /// Per-item problems (unresolved member, invalid hours, foreign member
    /// in a scoped batch) are collected in the result and never abort the
    /// call. Storage errors abort the whole batch with nothing applied; a
    /// unique-violation race is retried once with a fresh read before being
    /// surfaced as `Error::Conflict`.
    pub async fn reconcile(
        &self,
        scope: ReconcileScope,
        desired: Vec<DesiredAssignment>,
    ) -> Result<ReconciliationResult> {
        let mut result = ReconciliationResult::default();

        // A scoped batch replaces the complete state of its member. An
        // inactive or unknown member has no current state to replace, and
        // running the ending pass against one would strip the historical
        // assignments that soft-deactivation promises to keep.
        if let ReconcileScope::TeamMember(id) = scope {
            match team_members::load_team_member(&self.db, id).await? {
                Some(member) if member.active => {}
                _ => {
                    result.reject(format!("Team member not active: {}", id));
                    return Ok(result);
                }
            }
        }

        let (items, new_projects) = self.resolve_batch(scope, desired, &mut result).await?;

        match self.apply(scope, &items, &new_projects).await {
            Ok((created, updated, ended)) => {
                result.created = created;
                result.updated = updated;
                result.ended = ended;
            }
            Err(e) if e.is_unique_violation() => {
                // A concurrent writer raced past the diff; the transaction
                // rolled back, so re-read and re-diff once from scratch.
                tracing::warn!(error = %e, "Reconciliation raced a concurrent writer, retrying once");
                match self.apply(scope, &items, &new_projects).await {
                    Ok((created, updated, ended)) => {
                        result.created = created;
                        result.updated = updated;
                        result.ended = ended;
                    }
                    Err(e) if e.is_unique_violation() => {
                        return Err(Error::Conflict(
                            "Concurrent reconciliation on the same assignment keys".to_string(),
                        ));
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            created = result.created,
            updated = result.updated,
            ended = result.ended,
            skipped = result.skipped,
            errors = result.errors.len(),
            "Reconciliation complete"
        );

        Ok(result)
    }

    /// Validate and resolve the batch into canonical-id items
    ///
    /// Unresolved project references become new projects (created later,
    /// inside the apply transaction); unresolved member references are
    /// per-item errors. Duplicate (member, project) keys within the batch
    /// fold into the first occurrence by summing hours.
    async fn resolve_batch(
        &self,
        scope: ReconcileScope,
        desired: Vec<DesiredAssignment>,
        result: &mut ReconciliationResult,
    ) -> Result<(Vec<ResolvedItem>, Vec<Project>)> {
        let member_resolver = IdentityResolver::for_members(&self.db).await?;
        let mut project_resolver = IdentityResolver::for_projects(&self.db).await?;
        let mut new_projects: Vec<Project> = Vec::new();

        let mut items: Vec<ResolvedItem> = Vec::new();
        let mut by_key: HashMap<(Uuid, Uuid), usize> = HashMap::new();

        for item in desired {
            if !item.hours_this_week.is_finite()
                || item.hours_this_week < 0.0
                || !item.estimated_total_hours.is_finite()
                || item.estimated_total_hours < 0.0
            {
                result.reject(format!(
                    "Invalid hours for {} on {}: hours must be finite and >= 0",
                    item.member.label(),
                    item.project.label()
                ));
                continue;
            }

            let member_id = match &item.member {
                EntityRef::Id(id) => {
                    if member_resolver.contains_id(*id) {
                        *id
                    } else {
                        result.reject(format!("Unknown team member id: {}", id));
                        continue;
                    }
                }
                EntityRef::Name(name) => match member_resolver.resolve(name) {
                    Some(m) => m.guid,
                    None => {
                        // Members are never auto-created from free text
                        result.reject(format!("Team member not found: {}", name));
                        continue;
                    }
                },
            };

            if let ReconcileScope::TeamMember(scope_member) = scope {
                if member_id != scope_member {
                    result.reject(format!(
                        "Assignment for {} is outside the scope of this batch",
                        item.member.label()
                    ));
                    continue;
                }
            }

            let project_id = match &item.project {
                EntityRef::Id(id) => {
                    if project_resolver.contains_id(*id) {
                        *id
                    } else {
                        result.reject(format!("Unknown project id: {}", id));
                        continue;
                    }
                }
                EntityRef::Name(name) => match project_resolver.resolve(name) {
                    Some(m) => m.guid,
                    None => {
                        // Projects are auto-created on first reference
                        let project = Project::new(name.trim().to_string(), item.client.clone());
                        let guid = project.guid;
                        tracing::debug!(name = %project.name, "Auto-creating project for unresolved reference");
                        project_resolver.add(guid, project.name.clone());
                        new_projects.push(project);
                        guid
                    }
                },
            };

            let key = (member_id, project_id);
            match by_key.get(&key) {
                Some(&idx) => {
                    // Same pairing mentioned twice in one batch: the second
                    // occurrence adds hours rather than fighting the first.
                    items[idx].hours_this_week += item.hours_this_week;
                    items[idx].estimated_total_hours += item.estimated_total_hours;
                }
                None => {
                    by_key.insert(key, items.len());
                    items.push(ResolvedItem {
                        member_id,
                        project_id,
                        role: item.role,
                        hours_this_week: item.hours_this_week,
                        estimated_total_hours: item.estimated_total_hours,
                        source: item.source,
                        confidence: item.confidence,
                    });
                }
            }
        }

        Ok((items, new_projects))
    }

    /// Read-diff-write under a single transaction
    ///
    /// Returns (created, updated, ended). Any error leaves the store
    /// exactly as it was: the transaction rolls back on drop.
    async fn apply(
        &self,
        scope: ReconcileScope,
        items: &[ResolvedItem],
        new_projects: &[Project],
    ) -> Result<(usize, usize, usize)> {
        let mut tx = self.db.begin().await?;

        for project in new_projects {
            projects::create_project_tx(&mut *tx, project).await?;
        }

        let scope_member = match scope {
            ReconcileScope::TeamMember(id) => Some(id),
            ReconcileScope::Unscoped => None,
        };
        let current = assignments::list_active_tx(&mut *tx, scope_member).await?;

        #[cfg(test)]
        {
            let row = match self.contending_writes.lock() {
                Ok(mut rows) => rows.pop(),
                Err(_) => None,
            };
            if let Some(row) = row {
                assignments::create_assignment(&mut *tx, &row).await?;
            }
        }

        let mut current_by_key: HashMap<(Uuid, Uuid), &Assignment> = current
            .iter()
            .map(|a| ((a.team_member_id, a.project_id), a))
            .collect();

        let mut created = 0usize;
        let mut updated = 0usize;
        let mut ended = 0usize;

        for item in items {
            let key = (item.member_id, item.project_id);
            match current_by_key.remove(&key) {
                Some(existing) => {
                    // Manual provenance outranks automation: numeric fields
                    // update, source/confidence stay untouched.
                    let provenance = if existing.source == AssignmentSource::Manual
                        && item.source != AssignmentSource::Manual
                    {
                        None
                    } else {
                        Some((item.source, item.confidence))
                    };
                    assignments::update_assignment(
                        &mut *tx,
                        existing.guid,
                        &item.role,
                        item.hours_this_week,
                        item.estimated_total_hours,
                        provenance,
                    )
                    .await?;
                    updated += 1;
                }
                None => {
                    let assignment = Assignment::new(
                        item.member_id,
                        item.project_id,
                        item.role.clone(),
                        item.hours_this_week,
                        item.estimated_total_hours,
                        item.source,
                        item.confidence,
                    );
                    assignments::create_assignment(&mut *tx, &assignment).await?;
                    created += 1;
                }
            }
        }

        // Scoped reconciliation supplies the complete target state for one
        // member: anything left over is no longer desired. Unscoped batches
        // are partial views and never end assignments.
        if scope_member.is_some() {
            for leftover in current_by_key.values() {
                assignments::end_assignment(&mut *tx, leftover.guid).await?;
                ended += 1;
            }
        }

        tx.commit().await?;

        Ok((created, updated, ended))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::team_members::upsert_team_member;
    use crate::db::test_pool;

    fn desired(member: &str, project: &str, hours: f64, source: AssignmentSource) -> DesiredAssignment {
        DesiredAssignment {
            member: EntityRef::Name(member.to_string()),
            project: EntityRef::Name(project.to_string()),
            client: None,
            role: "team-member".to_string(),
            hours_this_week: hours,
            estimated_total_hours: hours,
            source,
            confidence: match source {
                AssignmentSource::Manual => None,
                _ => Some(0.8),
            },
        }
    }

    #[tokio::test]
    async fn test_unresolved_member_is_error_not_failure() {
        let pool = test_pool().await;
        let engine = ReconciliationEngine::new(pool.clone());

        let result = engine
            .reconcile(
                ReconcileScope::Unscoped,
                vec![desired("Nobody Known", "Coke", 5.0, AssignmentSource::AiExtraction)],
            )
            .await
            .unwrap();

        assert_eq!(result.created, 0);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Nobody Known"));
        // Member resolution happens before project resolution, so the
        // dropped item must not leave an auto-created project behind
        let projects = crate::db::projects::list_projects(&pool).await.unwrap();
        assert!(projects.is_empty());
    }

    #[tokio::test]
    async fn test_project_autocreated_with_active_status_and_client() {
        let pool = test_pool().await;
        upsert_team_member(&pool, "Tom Hyde", 40.0).await.unwrap();
        let engine = ReconciliationEngine::new(pool.clone());

        let mut item = desired("Tom Hyde", "Legos", 5.0, AssignmentSource::Import);
        item.client = Some("BrickCo".to_string());
        let result = engine
            .reconcile(ReconcileScope::Unscoped, vec![item])
            .await
            .unwrap();

        assert_eq!(result.created, 1);
        let project = crate::db::projects::find_by_exact_name(&pool, "Legos")
            .await
            .unwrap()
            .expect("project auto-created");
        assert_eq!(project.status, "active");
        assert_eq!(project.client.as_deref(), Some("BrickCo"));
    }

    #[tokio::test]
    async fn test_negative_hours_rejected_per_item() {
        let pool = test_pool().await;
        upsert_team_member(&pool, "Tom Hyde", 40.0).await.unwrap();
        let engine = ReconciliationEngine::new(pool.clone());

        let result = engine
            .reconcile(
                ReconcileScope::Unscoped,
                vec![
                    desired("Tom Hyde", "Coke", -3.0, AssignmentSource::Manual),
                    desired("Tom Hyde", "Legos", 4.0, AssignmentSource::Manual),
                ],
            )
            .await
            .unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors.len(), 1);
    }

    fn contending_row(member: Uuid, project: Uuid) -> Assignment {
        Assignment::new(
            member,
            project,
            "team-member".to_string(),
            2.0,
            2.0,
            AssignmentSource::Import,
            Some(1.0),
        )
    }

    #[tokio::test]
    async fn test_unique_race_converges_after_one_retry() {
        let pool = test_pool().await;
        let (tom, _) = upsert_team_member(&pool, "Tom Hyde", 40.0).await.unwrap();
        let project = crate::db::projects::Project::new("Coke".to_string(), None);
        crate::db::projects::create_project(&pool, &project).await.unwrap();

        let engine = ReconciliationEngine::new(pool.clone());
        // One contending writer lands the same (member, project) key after
        // the diff snapshot; the first apply pass fails, the retry re-reads
        // and succeeds.
        engine
            .contending_writes
            .lock()
            .unwrap()
            .push(contending_row(tom, project.guid));

        let result = engine
            .reconcile(
                ReconcileScope::Unscoped,
                vec![desired("Tom Hyde", "Coke", 5.0, AssignmentSource::Manual)],
            )
            .await
            .unwrap();

        assert_eq!(result.created, 1);
        assert!(result.errors.is_empty());
        let active = crate::db::assignments::list_active(&pool, Some(tom))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].hours_this_week, 5.0);
    }

    #[tokio::test]
    async fn test_persistent_unique_race_surfaces_conflict() {
        let pool = test_pool().await;
        let (tom, _) = upsert_team_member(&pool, "Tom Hyde", 40.0).await.unwrap();
        let project = crate::db::projects::Project::new("Coke".to_string(), None);
        crate::db::projects::create_project(&pool, &project).await.unwrap();

        let engine = ReconciliationEngine::new(pool.clone());
        // A contending writer beats both the first pass and the retry
        {
            let mut rows = engine.contending_writes.lock().unwrap();
            rows.push(contending_row(tom, project.guid));
            rows.push(contending_row(tom, project.guid));
        }

        let err = engine
            .reconcile(
                ReconcileScope::Unscoped,
                vec![desired("Tom Hyde", "Coke", 5.0, AssignmentSource::Manual)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Both passes rolled back; nothing half-applied
        let active = crate::db::assignments::list_active(&pool, Some(tom))
            .await
            .unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_scoped_batch_for_deactivated_member_ends_nothing() {
        let pool = test_pool().await;
        let (tom, _) = upsert_team_member(&pool, "Tom Hyde", 40.0).await.unwrap();
        let engine = ReconciliationEngine::new(pool.clone());

        engine
            .reconcile(
                ReconcileScope::TeamMember(tom),
                vec![desired("Tom Hyde", "Coke", 5.0, AssignmentSource::Manual)],
            )
            .await
            .unwrap();
        crate::db::team_members::deactivate_team_member(&pool, tom)
            .await
            .unwrap();

        // Deactivation leaves historical assignments in place; a scoped
        // batch for the deactivated member must not run the ending pass.
        let result = engine
            .reconcile(ReconcileScope::TeamMember(tom), vec![])
            .await
            .unwrap();
        assert_eq!(result.ended, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("not active"));

        let active = crate::db::assignments::list_active(&pool, Some(tom))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].hours_this_week, 5.0);
    }

    #[tokio::test]
    async fn test_scoped_batch_rejects_foreign_member() {
        let pool = test_pool().await;
        let (tom, _) = upsert_team_member(&pool, "Tom Hyde", 40.0).await.unwrap();
        upsert_team_member(&pool, "Jess Lucas", 40.0).await.unwrap();
        let engine = ReconciliationEngine::new(pool.clone());

        let result = engine
            .reconcile(
                ReconcileScope::TeamMember(tom),
                vec![
                    desired("Tom Hyde", "Coke", 4.0, AssignmentSource::Manual),
                    desired("Jess Lucas", "Coke", 4.0, AssignmentSource::Manual),
                ],
            )
            .await
            .unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(result.skipped, 1);
        let jess_active = crate::db::assignments::list_active(
            &pool,
            Some(
                crate::db::team_members::find_by_exact_name(&pool, "Jess Lucas")
                    .await
                    .unwrap()
                    .unwrap()
                    .guid,
            ),
        )
        .await
        .unwrap();
        assert!(jess_active.is_empty());
    }
}
