//! Forecast import endpoint

use axum::{extract::State, routing::post, Json, Router};

use crate::error::{ApiError, ApiResult};
use crate::ingest::forecast_import::{apply_forecast_import, ForecastImportRequest, ImportSummary};
use crate::AppState;

/// POST /import/forecast
///
/// Row-oriented team and allocation records from the forecasting
/// spreadsheet. The caller owns CSV parsing; this endpoint owns nothing but
/// the hand-off to the import adapter.
pub async fn import_forecast(
    State(state): State<AppState>,
    Json(request): Json<ForecastImportRequest>,
) -> ApiResult<Json<ImportSummary>> {
    if request.team_rows.is_empty() && request.allocation_rows.is_empty() {
        return Err(ApiError::BadRequest(
            "Import requires team_rows or allocation_rows".to_string(),
        ));
    }

    let summary = apply_forecast_import(&state.db, request).await?;
    Ok(Json(summary))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new().route("/import/forecast", post(import_forecast))
}
