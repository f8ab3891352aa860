//! Database access for crewcap-recon
//!
//! The entity store exclusively owns persistence and uniqueness of team
//! members, projects and assignments; the reconciliation engine only ever
//! mutates storage through the operations in this module.

pub mod assignments;
pub mod projects;
pub mod snapshots;
pub mod team_members;
pub mod transcripts;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to crewcap.db in the root folder, creating it if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize entity store tables
///
/// Creates team_members, projects, assignments, transcripts and
/// capacity_snapshots tables if they don't exist.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team_members (
            guid TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            weekly_capacity_hours REAL NOT NULL DEFAULT 40,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Full name unique within the active set, case-insensitive
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_team_members_active_name
        ON team_members(lower(full_name)) WHERE active = 1
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            client TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignments (
            guid TEXT PRIMARY KEY,
            team_member_id TEXT NOT NULL REFERENCES team_members(guid),
            project_id TEXT NOT NULL REFERENCES projects(guid),
            role TEXT NOT NULL DEFAULT 'team-member',
            hours_this_week REAL NOT NULL DEFAULT 0 CHECK (hours_this_week >= 0),
            estimated_total_hours REAL NOT NULL DEFAULT 0 CHECK (estimated_total_hours >= 0),
            status TEXT NOT NULL DEFAULT 'active',
            source TEXT NOT NULL DEFAULT 'manual',
            confidence REAL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Dedup backstop: at most one active assignment per (member, project)
    // pair, even if application-level serialization is imperfect.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_active_pair
        ON assignments(team_member_id, project_id) WHERE status = 'active'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcripts (
            guid TEXT PRIMARY KEY,
            meeting_date TEXT NOT NULL,
            meeting_type TEXT NOT NULL DEFAULT 'wip',
            raw_text TEXT NOT NULL,
            extracted_data TEXT NOT NULL DEFAULT '{}',
            extraction_confidence REAL NOT NULL DEFAULT 0.0,
            approved INTEGER NOT NULL DEFAULT 0,
            approved_at TEXT,
            processed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS capacity_snapshots (
            guid TEXT PRIMARY KEY,
            team_member_id TEXT NOT NULL REFERENCES team_members(guid),
            week_start_date TEXT NOT NULL,
            capacity_hours REAL NOT NULL DEFAULT 0,
            allocated_hours REAL NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(team_member_id, week_start_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (team_members, projects, assignments, transcripts, capacity_snapshots)"
    );

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // One connection: every pooled connection to :memory: is a distinct db
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_tables(&pool).await.expect("Schema initialization failed");
    pool
}
