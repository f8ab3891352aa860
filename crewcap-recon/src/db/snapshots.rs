//! Capacity snapshot persistence
//!
//! One row per (team member, week); the aggregator upserts the current
//! week's figures every time it runs so the board always has a durable
//! last-known-good record.

use crewcap_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Upsert the capacity snapshot for one member and week
pub async fn upsert_snapshot(
    pool: &SqlitePool,
    team_member_id: Uuid,
    week_start_date: &str,
    capacity_hours: f64,
    allocated_hours: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO capacity_snapshots (
            guid, team_member_id, week_start_date, capacity_hours, allocated_hours
        ) VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(team_member_id, week_start_date) DO UPDATE SET
            capacity_hours = excluded.capacity_hours,
            allocated_hours = excluded.allocated_hours,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(team_member_id.to_string())
    .bind(week_start_date)
    .bind(capacity_hours)
    .bind(allocated_hours)
    .execute(pool)
    .await?;

    Ok(())
}
