//! Transcript database operations
//!
//! Stores the raw meeting transcript alongside the untrusted extraction
//! payload produced by the external collaborator, pending human review.

use crewcap_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Stored transcript record
#[derive(Debug, Clone)]
pub struct Transcript {
    pub guid: Uuid,
    pub meeting_date: String,
    pub meeting_type: String,
    pub raw_text: String,
    /// Extraction payload as received, stored verbatim as JSON text
    pub extracted_data: serde_json::Value,
    pub extraction_confidence: f64,
    pub approved: bool,
}

impl Transcript {
    pub fn new(
        meeting_date: String,
        meeting_type: String,
        raw_text: String,
        extracted_data: serde_json::Value,
        extraction_confidence: f64,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            meeting_date,
            meeting_type,
            raw_text,
            extracted_data,
            extraction_confidence,
            approved: false,
        }
    }
}

fn transcript_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Transcript> {
    let guid_str: String = row.get("guid");
    let extracted: String = row.get("extracted_data");

    Ok(Transcript {
        guid: Uuid::parse_str(&guid_str)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?,
        meeting_date: row.get("meeting_date"),
        meeting_type: row.get("meeting_type"),
        raw_text: row.get("raw_text"),
        extracted_data: serde_json::from_str(&extracted)
            .map_err(|e| Error::Internal(format!("Corrupt extraction JSON: {}", e)))?,
        extraction_confidence: row.get("extraction_confidence"),
        approved: row.get::<i64, _>("approved") != 0,
    })
}

/// Save a processed transcript
pub async fn save_transcript(pool: &SqlitePool, transcript: &Transcript) -> Result<()> {
    let extracted = serde_json::to_string(&transcript.extracted_data)
        .map_err(|e| Error::Internal(format!("Failed to serialize extraction: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO transcripts (
            guid, meeting_date, meeting_type, raw_text,
            extracted_data, extraction_confidence, approved
        ) VALUES (?, ?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(transcript.guid.to_string())
    .bind(&transcript.meeting_date)
    .bind(&transcript.meeting_type)
    .bind(&transcript.raw_text)
    .bind(extracted)
    .bind(transcript.extraction_confidence)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a transcript by id
pub async fn load_transcript(pool: &SqlitePool, guid: Uuid) -> Result<Option<Transcript>> {
    let row = sqlx::query(
        r#"
        SELECT guid, meeting_date, meeting_type, raw_text,
               extracted_data, extraction_confidence, approved
        FROM transcripts WHERE guid = ?
        "#,
    )
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(transcript_from_row).transpose()
}

/// List recent transcripts, newest meeting first
pub async fn list_transcripts(pool: &SqlitePool, limit: i64) -> Result<Vec<Transcript>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, meeting_date, meeting_type, raw_text,
               extracted_data, extraction_confidence, approved
        FROM transcripts ORDER BY meeting_date DESC, processed_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(transcript_from_row).collect()
}

/// Mark a transcript as approved by the human reviewer
pub async fn mark_approved(pool: &SqlitePool, guid: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE transcripts SET approved = 1, approved_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
