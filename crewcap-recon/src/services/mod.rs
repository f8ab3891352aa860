//! Service components of the capacity reconciliation engine

pub mod allocation_aggregator;
pub mod identity_resolver;
pub mod reconciliation;

pub use allocation_aggregator::{CapacityConflict, ConflictSeverity, MemberUtilization};
pub use identity_resolver::{EntityKind, IdentityResolver, MatchType, ResolvedMatch};
pub use reconciliation::ReconciliationEngine;
