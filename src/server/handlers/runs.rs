use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::pipeline::types::{RowResult, RunReport};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub spreadsheet_id: String,
    /// Optional append-mode output target.
    #[serde(default)]
    pub document_id: Option<String>,
    /// Include the per-row detail list in the response.
    #[serde(default)]
    pub include_rows: bool,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<RowResult>>,
}

impl RunResponse {
    fn from_report(report: RunReport, include_rows: bool) -> Self {
        Self {
            run_id: report.run_id,
            total: report.total,
            succeeded: report.succeeded,
            failed: report.failed,
            skipped: report.skipped,
            started_at: report.started_at,
            finished_at: report.finished_at,
            rows: include_rows.then_some(report.rows),
        }
    }
}

/// Runs the full pipeline for one spreadsheet. Partial-success runs still
/// return 200 with failures itemized; only fatal pre-iteration errors
/// surface as error responses.
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    if request.spreadsheet_id.trim().is_empty() {
        return Err(ApiError::BadRequest("spreadsheet_id is required".to_string()));
    }

    let report = state
        .driver
        .run(&request.spreadsheet_id, request.document_id.as_deref())
        .await?;

    Ok(Json(RunResponse::from_report(report, request.include_rows)))
}
