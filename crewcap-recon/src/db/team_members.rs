//! Team member database operations

use crewcap_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Team member record
#[derive(Debug, Clone)]
pub struct TeamMember {
    pub guid: Uuid,
    pub full_name: String,
    pub weekly_capacity_hours: f64,
    pub active: bool,
}

impl TeamMember {
    /// Create new team member with the default 40h week
    pub fn new(full_name: String) -> Self {
        Self {
            guid: Uuid::new_v4(),
            full_name,
            weekly_capacity_hours: 40.0,
            active: true,
        }
    }

    pub fn with_capacity(full_name: String, weekly_capacity_hours: f64) -> Self {
        Self {
            guid: Uuid::new_v4(),
            full_name,
            weekly_capacity_hours,
            active: true,
        }
    }
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TeamMember> {
    let guid_str: String = row.get("guid");
    Ok(TeamMember {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?,
        full_name: row.get("full_name"),
        weekly_capacity_hours: row.get("weekly_capacity_hours"),
        active: row.get::<i64, _>("active") != 0,
    })
}

/// List team members, optionally restricted to the active set
pub async fn list_team_members(pool: &SqlitePool, active_only: bool) -> Result<Vec<TeamMember>> {
    let sql = if active_only {
        r#"
        SELECT guid, full_name, weekly_capacity_hours, active
        FROM team_members WHERE active = 1 ORDER BY full_name COLLATE NOCASE
        "#
    } else {
        r#"
        SELECT guid, full_name, weekly_capacity_hours, active
        FROM team_members ORDER BY full_name COLLATE NOCASE
        "#
    };

    let rows = sqlx::query(sql).fetch_all(pool).await?;
    rows.iter().map(member_from_row).collect()
}

/// Load a team member by id
pub async fn load_team_member(pool: &SqlitePool, guid: Uuid) -> Result<Option<TeamMember>> {
    let row = sqlx::query(
        r#"
        SELECT guid, full_name, weekly_capacity_hours, active
        FROM team_members WHERE guid = ?
        "#,
    )
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(member_from_row).transpose()
}

/// Find an active team member by exact name, case-insensitive
pub async fn find_by_exact_name(pool: &SqlitePool, full_name: &str) -> Result<Option<TeamMember>> {
    let row = sqlx::query(
        r#"
        SELECT guid, full_name, weekly_capacity_hours, active
        FROM team_members
        WHERE active = 1 AND lower(full_name) = lower(?)
        "#,
    )
    .bind(full_name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(member_from_row).transpose()
}

/// Create-or-update a team member keyed on exact name match
///
/// This is the only path that creates team members from external data
/// (structured import rows carry a canonical name field; free text never
/// creates members). Returns the canonical id and whether a row was created.
pub async fn upsert_team_member(
    pool: &SqlitePool,
    full_name: &str,
    weekly_capacity_hours: f64,
) -> Result<(Uuid, bool)> {
    if let Some(existing) = find_by_exact_name(pool, full_name).await? {
        sqlx::query(
            r#"
            UPDATE team_members
            SET weekly_capacity_hours = ?, updated_at = CURRENT_TIMESTAMP
            WHERE guid = ?
            "#,
        )
        .bind(weekly_capacity_hours)
        .bind(existing.guid.to_string())
        .execute(pool)
        .await?;
        return Ok((existing.guid, false));
    }

    let member = TeamMember::with_capacity(full_name.to_string(), weekly_capacity_hours);
    sqlx::query(
        r#"
        INSERT INTO team_members (guid, full_name, weekly_capacity_hours, active)
        VALUES (?, ?, ?, 1)
        "#,
    )
    .bind(member.guid.to_string())
    .bind(&member.full_name)
    .bind(member.weekly_capacity_hours)
    .execute(pool)
    .await?;

    Ok((member.guid, true))
}

/// Soft-delete a team member so historical assignments remain valid
pub async fn deactivate_team_member(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE team_members SET active = 0, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ? AND active = 1
        "#,
    )
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let pool = test_pool().await;

        let (id, created) = upsert_team_member(&pool, "Tom Hyde", 38.0).await.unwrap();
        assert!(created);

        let (id2, created2) = upsert_team_member(&pool, "tom hyde", 32.0).await.unwrap();
        assert!(!created2, "exact name match must reuse the record");
        assert_eq!(id, id2);

        let member = load_team_member(&pool, id).await.unwrap().unwrap();
        assert_eq!(member.weekly_capacity_hours, 32.0);
        assert_eq!(member.full_name, "Tom Hyde");
    }

    #[tokio::test]
    async fn test_deactivate_is_soft() {
        let pool = test_pool().await;
        let (id, _) = upsert_team_member(&pool, "Jess Lucas", 40.0).await.unwrap();

        assert!(deactivate_team_member(&pool, id).await.unwrap());
        // Row still loadable, just inactive
        let member = load_team_member(&pool, id).await.unwrap().unwrap();
        assert!(!member.active);
        // Not part of the active set anymore
        assert!(find_by_exact_name(&pool, "Jess Lucas").await.unwrap().is_none());
        let active = list_team_members(&pool, true).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_active_name_unique_index_backstop() {
        let pool = test_pool().await;
        upsert_team_member(&pool, "Ana Ruiz", 40.0).await.unwrap();

        // Direct insert bypassing the upsert must hit the partial index
        let result = sqlx::query(
            "INSERT INTO team_members (guid, full_name) VALUES (?, 'ana ruiz')",
        )
        .bind(Uuid::new_v4().to_string())
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
