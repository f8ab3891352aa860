//! Transcript extraction approval adapter
//!
//! The extraction collaborator turns a meeting transcript into a structured
//! payload of suggested facts. Every name in it is untrusted free text and
//! goes through the identity resolver; nothing is applied until a human
//! reviewer selects the suggestions worth keeping. Unselected suggestions
//! are discarded without side effects.

use crewcap_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::transcripts;
use crate::services::ReconciliationEngine;
use crate::types::{
    AssignmentSource, DesiredAssignment, EntityRef, ReconcileScope, ReconciliationResult,
};

/// Hours assumed when the transcript mentions an assignment without a number
const DEFAULT_EXTRACTED_HOURS: f64 = 8.0;

/// A project the extractor believes was discussed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectExtraction {
    pub name: String,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// An assignment fact the extractor pulled from the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentExtraction {
    pub person_name: String,
    pub project_name: String,
    #[serde(default)]
    pub role_inferred: Option<String>,
    #[serde(default)]
    pub hours_this_week: Option<f64>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// A capacity remark ("Jess is slammed next week") — surfaced to reviewers,
/// never written to the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacitySignal {
    pub person_name: String,
    pub signal_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Complete payload from the extraction collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptExtraction {
    #[serde(default)]
    pub projects: Vec<ProjectExtraction>,
    #[serde(default)]
    pub assignments: Vec<AssignmentExtraction>,
    #[serde(default)]
    pub suggested_assignments: Vec<AssignmentExtraction>,
    #[serde(default)]
    pub capacity_signals: Vec<CapacitySignal>,
    #[serde(default)]
    pub overall_confidence: f64,
}

/// The reviewer's accepted subset for one transcript
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequest {
    pub transcript_id: Uuid,
    /// Only the extracted assignments the reviewer selected
    pub assignments: Vec<AssignmentExtraction>,
}

/// Apply an approval as an unscoped (additive) reconciliation and mark the
/// transcript approved
pub async fn apply_approval(
    pool: &SqlitePool,
    request: ApprovalRequest,
) -> Result<ReconciliationResult> {
    let desired: Vec<DesiredAssignment> = request
        .assignments
        .into_iter()
        .map(|extraction| {
            let hours = extraction
                .hours_this_week
                .unwrap_or(DEFAULT_EXTRACTED_HOURS);
            DesiredAssignment {
                member: EntityRef::Name(extraction.person_name),
                project: EntityRef::Name(extraction.project_name),
                client: None,
                role: extraction
                    .role_inferred
                    .unwrap_or_else(|| "team-member".to_string()),
                hours_this_week: hours,
                estimated_total_hours: hours,
                source: AssignmentSource::AiExtraction,
                confidence: Some(extraction.confidence),
            }
        })
        .collect();

    // Verify the transcript before touching the store so an approval of a
    // stale id has no side effects
    if transcripts::load_transcript(pool, request.transcript_id)
        .await?
        .is_none()
    {
        return Err(Error::NotFound(format!(
            "Transcript not found: {}",
            request.transcript_id
        )));
    }

    let result = ReconciliationEngine::new(pool.clone())
        .reconcile(ReconcileScope::Unscoped, desired)
        .await?;

    transcripts::mark_approved(pool, request.transcript_id).await?;

    Ok(result)
}
