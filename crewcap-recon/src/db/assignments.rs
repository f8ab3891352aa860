//! Assignment database operations
//!
//! All write operations take `&mut SqliteConnection` so the reconciliation
//! engine can run a whole batch inside one transaction; reads that back the
//! aggregator go straight to the pool.

use crewcap_common::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::types::AssignmentSource;

/// Assignment record
#[derive(Debug, Clone)]
pub struct Assignment {
    pub guid: Uuid,
    pub team_member_id: Uuid,
    pub project_id: Uuid,
    pub role: String,
    pub hours_this_week: f64,
    pub estimated_total_hours: f64,
    pub status: String,
    pub source: AssignmentSource,
    pub confidence: Option<f64>,
}

impl Assignment {
    /// New active assignment for a (member, project) pairing
    pub fn new(
        team_member_id: Uuid,
        project_id: Uuid,
        role: String,
        hours_this_week: f64,
        estimated_total_hours: f64,
        source: AssignmentSource,
        confidence: Option<f64>,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            team_member_id,
            project_id,
            role,
            hours_this_week,
            estimated_total_hours,
            status: "active".to_string(),
            source,
            confidence,
        }
    }
}

fn assignment_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Assignment> {
    let parse_uuid = |col: &str| -> Result<Uuid> {
        let s: String = row.get(col);
        Uuid::parse_str(&s)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
    };
    let source_str: String = row.get("source");

    Ok(Assignment {
        guid: parse_uuid("guid")?,
        team_member_id: parse_uuid("team_member_id")?,
        project_id: parse_uuid("project_id")?,
        role: row.get("role"),
        hours_this_week: row.get("hours_this_week"),
        estimated_total_hours: row.get("estimated_total_hours"),
        status: row.get("status"),
        source: AssignmentSource::parse(&source_str)
            .ok_or_else(|| Error::Internal(format!("Unknown assignment source: {}", source_str)))?,
        confidence: row.get("confidence"),
    })
}

const SELECT_ACTIVE: &str = r#"
    SELECT guid, team_member_id, project_id, role, hours_this_week,
           estimated_total_hours, status, source, confidence
    FROM assignments WHERE status = 'active'
"#;

/// Load active assignments, optionally filtered to one team member
pub async fn list_active(
    pool: &SqlitePool,
    team_member_id: Option<Uuid>,
) -> Result<Vec<Assignment>> {
    let mut conn = pool.acquire().await?;
    list_active_tx(&mut conn, team_member_id).await
}

/// Load active assignments inside an open transaction
pub async fn list_active_tx(
    conn: &mut SqliteConnection,
    team_member_id: Option<Uuid>,
) -> Result<Vec<Assignment>> {
    let rows = match team_member_id {
        Some(member_id) => {
            let sql = format!("{} AND team_member_id = ?", SELECT_ACTIVE);
            sqlx::query(&sql)
                .bind(member_id.to_string())
                .fetch_all(conn)
                .await?
        }
        None => sqlx::query(SELECT_ACTIVE).fetch_all(conn).await?,
    };

    rows.iter().map(assignment_from_row).collect()
}

/// Insert a new active assignment
///
/// A unique-violation here means a concurrent writer created the same
/// (member, project) pairing after we diffed; callers retry once.
pub async fn create_assignment(conn: &mut SqliteConnection, a: &Assignment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO assignments (
            guid, team_member_id, project_id, role, hours_this_week,
            estimated_total_hours, status, source, confidence
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(a.guid.to_string())
    .bind(a.team_member_id.to_string())
    .bind(a.project_id.to_string())
    .bind(&a.role)
    .bind(a.hours_this_week)
    .bind(a.estimated_total_hours)
    .bind(&a.status)
    .bind(a.source.as_str())
    .bind(a.confidence)
    .execute(conn)
    .await?;

    Ok(())
}

/// Update hours/role fields of an existing assignment in place
///
/// Source and confidence are updated only when provided; the reconciliation
/// engine withholds them to preserve manual provenance.
pub async fn update_assignment(
    conn: &mut SqliteConnection,
    guid: Uuid,
    role: &str,
    hours_this_week: f64,
    estimated_total_hours: f64,
    provenance: Option<(AssignmentSource, Option<f64>)>,
) -> Result<()> {
    match provenance {
        Some((source, confidence)) => {
            sqlx::query(
                r#"
                UPDATE assignments
                SET role = ?, hours_this_week = ?, estimated_total_hours = ?,
                    source = ?, confidence = ?, updated_at = CURRENT_TIMESTAMP
                WHERE guid = ?
                "#,
            )
            .bind(role)
            .bind(hours_this_week)
            .bind(estimated_total_hours)
            .bind(source.as_str())
            .bind(confidence)
            .bind(guid.to_string())
            .execute(conn)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                UPDATE assignments
                SET role = ?, hours_this_week = ?, estimated_total_hours = ?,
                    updated_at = CURRENT_TIMESTAMP
                WHERE guid = ?
                "#,
            )
            .bind(role)
            .bind(hours_this_week)
            .bind(estimated_total_hours)
            .bind(guid.to_string())
            .execute(conn)
            .await?;
        }
    }

    Ok(())
}

/// Transition an assignment out of the active set
pub async fn end_assignment(conn: &mut SqliteConnection, guid: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE assignments SET status = 'ended', updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND status = 'active'
        "#,
    )
    .bind(guid.to_string())
    .execute(conn)
    .await?;

    Ok(())
}
