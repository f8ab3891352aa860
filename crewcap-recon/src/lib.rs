//! crewcap-recon library interface
//!
//! Capacity reconciliation service: resolves loosely-specified person and
//! project references, merges proposed assignment facts into the entity
//! store without duplicates, and aggregates per-member utilization.

pub mod api;
pub mod db;
pub mod error;
pub mod ingest;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::capacity_routes())
        .merge(api::assignment_routes())
        .merge(api::import_routes())
        .merge(api::transcript_routes())
        .with_state(state)
}
