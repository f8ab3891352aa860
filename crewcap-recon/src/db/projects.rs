//! Project database operations

use crewcap_common::{Error, Result};
use sqlx::{Row, SqlitePool, SqliteConnection};
use uuid::Uuid;

/// Closed set of project statuses
pub const PROJECT_STATUSES: &[&str] = &["briefing", "active", "on-hold", "completed"];

/// Project record
#[derive(Debug, Clone)]
pub struct Project {
    pub guid: Uuid,
    pub name: String,
    pub client: Option<String>,
    pub status: String,
}

impl Project {
    /// New project in the default 'active' status
    pub fn new(name: String, client: Option<String>) -> Self {
        Self {
            guid: Uuid::new_v4(),
            name,
            client,
            status: "active".to_string(),
        }
    }
}

fn project_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Project> {
    let guid_str: String = row.get("guid");
    Ok(Project {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?,
        name: row.get("name"),
        client: row.get("client"),
        status: row.get("status"),
    })
}

/// List all projects sorted by name
pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, name, client, status
        FROM projects ORDER BY name COLLATE NOCASE
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(project_from_row).collect()
}

/// Load a project by id
pub async fn load_project(pool: &SqlitePool, guid: Uuid) -> Result<Option<Project>> {
    let row = sqlx::query(
        r#"
        SELECT guid, name, client, status FROM projects WHERE guid = ?
        "#,
    )
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(project_from_row).transpose()
}

/// Find a project by exact name, case-insensitive
pub async fn find_by_exact_name(pool: &SqlitePool, name: &str) -> Result<Option<Project>> {
    let row = sqlx::query(
        r#"
        SELECT guid, name, client, status
        FROM projects WHERE lower(name) = lower(?)
        ORDER BY name COLLATE NOCASE LIMIT 1
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(project_from_row).transpose()
}

/// Insert a new project
pub async fn create_project(pool: &SqlitePool, project: &Project) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO projects (guid, name, client, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(project.guid.to_string())
    .bind(&project.name)
    .bind(&project.client)
    .bind(&project.status)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert a new project inside an open transaction
///
/// Used by the reconciliation engine so auto-created projects are part of
/// the same atomic unit as the assignment writes they anchor.
pub async fn create_project_tx(conn: &mut SqliteConnection, project: &Project) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO projects (guid, name, client, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(project.guid.to_string())
    .bind(&project.name)
    .bind(&project.client)
    .bind(&project.status)
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_create_and_find_project() {
        let pool = test_pool().await;

        let project = Project::new("Legos".to_string(), Some("BrickCo".to_string()));
        create_project(&pool, &project).await.unwrap();

        let found = find_by_exact_name(&pool, "legos").await.unwrap().unwrap();
        assert_eq!(found.guid, project.guid);
        assert_eq!(found.status, "active");
        assert_eq!(found.client.as_deref(), Some("BrickCo"));

        assert!(find_by_exact_name(&pool, "Duplo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_projects_sorted_by_name() {
        let pool = test_pool().await;
        for name in ["zeta", "Alpha", "midway"] {
            create_project(&pool, &Project::new(name.to_string(), None))
                .await
                .unwrap();
        }

        let names: Vec<String> = list_projects(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "midway", "zeta"]);
    }
}
