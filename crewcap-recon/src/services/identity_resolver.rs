//! Identity resolution for free-text entity references
//!
//! Meeting transcripts and spreadsheets refer to people and projects by
//! whatever name the speaker used ("Tommy", "the Coke thing"), so the
//! resolver maps a free-text label to at most one canonical entity id.
//!
//! **Algorithm** (first hit wins):
//! 1. Exact match, case-insensitive, against the full canonical name
//! 2. Members only: first token of the query against the first token of
//!    each canonical name (handles "first name only" references)
//! 3. Substring match in either direction, case-insensitive
//!
//! When several candidates satisfy a non-exact rule the resolver picks the
//! first in a stable case-insensitive sort by name. Ambiguity is resolved,
//! not rejected: transcript data routinely uses shortened names, and the
//! caller can inspect `match_type`/`similarity` to tell a guess from a
//! certainty. Resolution is a pure read; it never creates entities.

use crewcap_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// What kind of entity a resolver searches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Member,
    Project,
}

/// How confident a match is, by construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Full-name match; safe to trust
    Exact,
    /// First-token match (members only); a heuristic
    Prefix,
    /// Substring containment either direction; the weakest rule
    Substring,
}

/// A resolved reference: canonical id plus how it was matched
#[derive(Debug, Clone)]
pub struct ResolvedMatch {
    pub guid: Uuid,
    pub canonical_name: String,
    pub match_type: MatchType,
    /// Jaro-Winkler similarity between query and canonical name.
    /// Informative only; never used for candidate selection.
    pub similarity: f64,
}

#[derive(Debug, Clone)]
struct Candidate {
    guid: Uuid,
    name: String,
}

/// Identity resolver over a snapshot of canonical records
///
/// Built once per reconciliation call from current entity store state;
/// resolution itself is pure and side-effect free.
pub struct IdentityResolver {
    kind: EntityKind,
    candidates: Vec<Candidate>,
}

impl IdentityResolver {
    /// Snapshot the active team members
    pub async fn for_members(pool: &SqlitePool) -> Result<Self> {
        let members = crate::db::team_members::list_team_members(pool, true).await?;
        Ok(Self::from_pairs(
            EntityKind::Member,
            members.into_iter().map(|m| (m.guid, m.full_name)),
        ))
    }

    /// Snapshot all projects
    pub async fn for_projects(pool: &SqlitePool) -> Result<Self> {
        let projects = crate::db::projects::list_projects(pool).await?;
        Ok(Self::from_pairs(
            EntityKind::Project,
            projects.into_iter().map(|p| (p.guid, p.name)),
        ))
    }

    /// Build from (id, name) pairs; used directly in tests
    pub fn from_pairs(kind: EntityKind, pairs: impl IntoIterator<Item = (Uuid, String)>) -> Self {
        let mut candidates: Vec<Candidate> = pairs
            .into_iter()
            .map(|(guid, name)| Candidate { guid, name })
            .collect();
        // Stable sort by name makes every non-exact rule deterministic
        candidates.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.guid.cmp(&b.guid))
        });
        Self { kind, candidates }
    }

    /// Register an entity created after the snapshot was taken
    /// (the engine auto-creates projects mid-batch)
    pub fn add(&mut self, guid: Uuid, name: String) {
        self.candidates.push(Candidate { guid, name });
        self.candidates.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.guid.cmp(&b.guid))
        });
    }

    /// True when the given id is in the snapshot
    pub fn contains_id(&self, guid: Uuid) -> bool {
        self.candidates.iter().any(|c| c.guid == guid)
    }

    /// Resolve free text to zero-or-one canonical record
    pub fn resolve(&self, text: &str) -> Option<ResolvedMatch> {
        let query = text.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }

        // Rule 1: exact full-name match
        for candidate in &self.candidates {
            if candidate.name.to_lowercase() == query {
                return Some(self.matched(candidate, &query, MatchType::Exact));
            }
        }

        // Rule 2: first-token match, members only. Tolerates diminutives in
        // either direction ("Tommy" finds "Tom Hyde", "Tom" finds "Tommy
        // Jarvis") by accepting one first token as a prefix of the other.
        if self.kind == EntityKind::Member {
            if let Some(query_first) = query.split_whitespace().next() {
                for candidate in &self.candidates {
                    let name = candidate.name.to_lowercase();
                    let Some(candidate_first) = name.split_whitespace().next() else {
                        continue;
                    };
                    if candidate_first.starts_with(query_first)
                        || query_first.starts_with(candidate_first)
                    {
                        return Some(self.matched(candidate, &query, MatchType::Prefix));
                    }
                }
            }
        }

        // Rule 3: substring containment either direction
        for candidate in &self.candidates {
            let name = candidate.name.to_lowercase();
            if name.contains(&query) || query.contains(&name) {
                return Some(self.matched(candidate, &query, MatchType::Substring));
            }
        }

        None
    }

    fn matched(&self, candidate: &Candidate, query: &str, match_type: MatchType) -> ResolvedMatch {
        let similarity = strsim::jaro_winkler(query, &candidate.name.to_lowercase());
        tracing::debug!(
            query = %query,
            canonical = %candidate.name,
            match_type = ?match_type,
            similarity = similarity,
            "Resolved entity reference"
        );
        ResolvedMatch {
            guid: candidate.guid,
            canonical_name: candidate.name.clone(),
            match_type,
            similarity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_resolver(names: &[&str]) -> IdentityResolver {
        IdentityResolver::from_pairs(
            EntityKind::Member,
            names.iter().map(|n| (Uuid::new_v4(), n.to_string())),
        )
    }

    fn project_resolver(names: &[&str]) -> IdentityResolver {
        IdentityResolver::from_pairs(
            EntityKind::Project,
            names.iter().map(|n| (Uuid::new_v4(), n.to_string())),
        )
    }

    #[test]
    fn test_exact_match_case_insensitive() {
        let resolver = member_resolver(&["Tom Hyde", "Jess Lucas"]);
        let result = resolver.resolve("tom hyde").unwrap();
        assert_eq!(result.canonical_name, "Tom Hyde");
        assert_eq!(result.match_type, MatchType::Exact);
        assert!(result.similarity > 0.99);
    }

    #[test]
    fn test_first_token_rule_for_members() {
        let resolver = member_resolver(&["Tom Hyde", "Jess Lucas"]);
        let result = resolver.resolve("Tom").unwrap();
        assert_eq!(result.canonical_name, "Tom Hyde");
        assert_eq!(result.match_type, MatchType::Prefix);
    }

    #[test]
    fn test_first_token_rule_not_applied_to_projects() {
        // "Legos Phase" shares a first token with "Legos Phase Two" but
        // projects only get exact and substring rules.
        let resolver = project_resolver(&["Legos Rollout"]);
        let result = resolver.resolve("Legos Campaign");
        assert!(result.is_none());
    }

    #[test]
    fn test_substring_both_directions() {
        let resolver = project_resolver(&["Coke Summer Campaign"]);
        // canonical contains query
        let result = resolver.resolve("coke").unwrap();
        assert_eq!(result.match_type, MatchType::Substring);
        // query contains canonical
        let resolver = project_resolver(&["Coke"]);
        let result = resolver.resolve("the Coke account work").unwrap();
        assert_eq!(result.canonical_name, "Coke");
    }

    #[test]
    fn test_ambiguity_resolved_by_stable_name_sort() {
        // Two Toms: the first in case-insensitive name order wins,
        // deterministically, rather than erroring.
        let resolver = member_resolver(&["Tom Wilson", "Tom Hyde"]);
        let result = resolver.resolve("Tommy is around").unwrap();
        assert_eq!(result.canonical_name, "Tom Hyde");
    }

    #[test]
    fn test_diminutive_first_name_resolves() {
        let resolver = member_resolver(&["Tom Hyde", "Jess Lucas"]);
        let result = resolver.resolve("Tommy").unwrap();
        assert_eq!(result.canonical_name, "Tom Hyde");
        assert_eq!(result.match_type, MatchType::Prefix);
        assert!(result.similarity < 1.0);
    }

    #[test]
    fn test_not_found_and_empty() {
        let resolver = member_resolver(&["Tom Hyde"]);
        assert!(resolver.resolve("Zelda").is_none());
        assert!(resolver.resolve("   ").is_none());
    }

    #[test]
    fn test_add_after_snapshot() {
        let mut resolver = project_resolver(&[]);
        assert!(resolver.resolve("Legos").is_none());
        let id = Uuid::new_v4();
        resolver.add(id, "Legos".to_string());
        assert_eq!(resolver.resolve("legos").unwrap().guid, id);
        assert!(resolver.contains_id(id));
    }
}
