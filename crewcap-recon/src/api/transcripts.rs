//! Transcript storage and extraction-approval endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::transcripts::{self, Transcript};
use crate::error::{ApiError, ApiResult};
use crate::ingest::extraction_approval::{apply_approval, ApprovalRequest, TranscriptExtraction};
use crate::types::ReconciliationResult;
use crate::AppState;

/// POST /transcripts body: raw text plus the collaborator's extraction
#[derive(Debug, Deserialize)]
pub struct StoreTranscriptRequest {
    pub meeting_date: String,
    #[serde(default = "default_meeting_type")]
    pub meeting_type: String,
    pub raw_text: String,
    pub extraction: TranscriptExtraction,
}

fn default_meeting_type() -> String {
    "wip".to_string()
}

#[derive(Debug, Serialize)]
pub struct StoreTranscriptResponse {
    pub transcript_id: Uuid,
    pub extraction_confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct TranscriptSummary {
    pub transcript_id: Uuid,
    pub meeting_date: String,
    pub meeting_type: String,
    pub extraction_confidence: f64,
    pub approved: bool,
}

/// POST /transcripts
///
/// Stores the transcript and its extraction payload for review. The
/// extraction is untrusted input; nothing touches the assignment store
/// until a reviewer approves a selection.
pub async fn store_transcript(
    State(state): State<AppState>,
    Json(request): Json<StoreTranscriptRequest>,
) -> ApiResult<Json<StoreTranscriptResponse>> {
    if request.raw_text.trim().is_empty() {
        return Err(ApiError::BadRequest("Transcript text is required".to_string()));
    }

    let extracted_data = serde_json::to_value(&request.extraction)
        .map_err(|e| ApiError::Internal(format!("Failed to encode extraction: {}", e)))?;

    let transcript = Transcript::new(
        request.meeting_date,
        request.meeting_type,
        request.raw_text,
        extracted_data,
        request.extraction.overall_confidence,
    );
    transcripts::save_transcript(&state.db, &transcript).await?;

    Ok(Json(StoreTranscriptResponse {
        transcript_id: transcript.guid,
        extraction_confidence: transcript.extraction_confidence,
    }))
}

/// GET /transcripts
pub async fn list_transcripts(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TranscriptSummary>>> {
    let transcripts = transcripts::list_transcripts(&state.db, 50).await?;
    Ok(Json(
        transcripts
            .into_iter()
            .map(|t| TranscriptSummary {
                transcript_id: t.guid,
                meeting_date: t.meeting_date,
                meeting_type: t.meeting_type,
                extraction_confidence: t.extraction_confidence,
                approved: t.approved,
            })
            .collect(),
    ))
}

/// GET /transcripts/:id
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let transcript = transcripts::load_transcript(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Transcript not found: {}", id)))?;

    Ok(Json(serde_json::json!({
        "transcript_id": transcript.guid,
        "meeting_date": transcript.meeting_date,
        "meeting_type": transcript.meeting_type,
        "raw_text": transcript.raw_text,
        "extracted_data": transcript.extracted_data,
        "extraction_confidence": transcript.extraction_confidence,
        "approved": transcript.approved,
    })))
}

/// POST /transcripts/:id/approve body: the reviewer's accepted subset
#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub assignments: Vec<crate::ingest::extraction_approval::AssignmentExtraction>,
}

/// POST /transcripts/:id/approve
pub async fn approve_transcript(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ApproveBody>,
) -> ApiResult<Json<ReconciliationResult>> {
    let result = apply_approval(
        &state.db,
        ApprovalRequest {
            transcript_id: id,
            assignments: body.assignments,
        },
    )
    .await?;

    Ok(Json(result))
}

/// Build transcript routes
pub fn transcript_routes() -> Router<AppState> {
    Router::new()
        .route("/transcripts", post(store_transcript).get(list_transcripts))
        .route("/transcripts/:id", get(get_transcript))
        .route("/transcripts/:id/approve", post(approve_transcript))
}
