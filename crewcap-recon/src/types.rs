//! Shared types for the reconciliation engine
//!
//! These are the boundary types every ingestion adapter speaks: a batch of
//! desired assignment facts plus the scope that batch is authorized to
//! replace, and the per-call result handed back to the caller.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provenance of an assignment fact
///
/// `Manual` is the highest-trust source: reconciliation never lets an
/// automated source overwrite the source/confidence of a manually-created
/// assignment (numeric fields still update).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentSource {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "import")]
    Import,
    #[serde(rename = "ai-extraction")]
    AiExtraction,
}

impl AssignmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentSource::Manual => "manual",
            AssignmentSource::Import => "import",
            AssignmentSource::AiExtraction => "ai-extraction",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(AssignmentSource::Manual),
            "import" => Some(AssignmentSource::Import),
            "ai-extraction" => Some(AssignmentSource::AiExtraction),
            _ => None,
        }
    }
}

/// A reference to a team member or project: either an already-canonical id
/// or free text still to be resolved against the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(Uuid),
    Name(String),
}

impl EntityRef {
    /// Display form for error messages
    pub fn label(&self) -> String {
        match self {
            EntityRef::Id(id) => id.to_string(),
            EntityRef::Name(name) => name.clone(),
        }
    }
}

/// One proposed assignment fact, as produced by an ingestion adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredAssignment {
    pub member: EntityRef,
    pub project: EntityRef,
    /// Client label for the project; applied only when the project is
    /// auto-created from an unresolved name reference
    #[serde(default)]
    pub client: Option<String>,
    pub role: String,
    pub hours_this_week: f64,
    pub estimated_total_hours: f64,
    pub source: AssignmentSource,
    /// Meaningful only for non-manual sources
    pub confidence: Option<f64>,
}

/// The subset of the entity store a reconciliation call may fully replace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileScope {
    /// Complete target state for one team member: assignments for that
    /// member absent from the desired set are ended.
    TeamMember(Uuid),
    /// Additive/upsert-only: the batch is a partial view of reality and
    /// never ends anything.
    Unscoped,
}

/// Outcome of one reconciliation call. Ephemeral, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub created: usize,
    pub updated: usize,
    pub ended: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ReconciliationResult {
    /// Record a per-item failure: the item is dropped, the reason kept.
    pub fn reject(&mut self, reason: String) {
        self.skipped += 1;
        self.errors.push(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trip() {
        for source in [
            AssignmentSource::Manual,
            AssignmentSource::Import,
            AssignmentSource::AiExtraction,
        ] {
            assert_eq!(AssignmentSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(AssignmentSource::parse("csv"), None);
    }

    #[test]
    fn test_entity_ref_deserializes_id_or_name() {
        let id: EntityRef =
            serde_json::from_str("\"0cc175b9-0000-4000-8000-426655440000\"").unwrap();
        assert!(matches!(id, EntityRef::Id(_)));

        let name: EntityRef = serde_json::from_str("\"Tom Hyde\"").unwrap();
        assert_eq!(name, EntityRef::Name("Tom Hyde".to_string()));
    }

    #[test]
    fn test_reject_counts_and_records() {
        let mut result = ReconciliationResult::default();
        result.reject("Team member not found: Ghost".to_string());
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors.len(), 1);
    }
}
