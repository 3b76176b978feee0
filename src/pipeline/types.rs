use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One input row from the tabular source.
///
/// `position` is the 1-based row number in the sheet (data rows start at 2,
/// below the header) and is the row's identity for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    pub position: usize,
    pub requirement: String,
    /// Optional second input column: an existing draft answer used as
    /// additional grounding.
    pub draft: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Success,
    Fail,
    Skipped,
}

/// Outcome of processing one row. Created once, never merged or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowResult {
    pub position: usize,
    pub input: String,
    pub output: String,
    pub status: RowStatus,
    pub error: String,
}

impl RowResult {
    pub fn success(row: &Row, output: String) -> Self {
        Self {
            position: row.position,
            input: row.requirement.clone(),
            output,
            status: RowStatus::Success,
            error: String::new(),
        }
    }

    pub fn skipped(row: &Row) -> Self {
        Self {
            position: row.position,
            input: row.requirement.clone(),
            output: String::new(),
            status: RowStatus::Skipped,
            error: String::new(),
        }
    }

    pub fn fail(row: &Row, error: String) -> Self {
        Self::fail_at(row.position, row.requirement.clone(), error)
    }

    pub fn fail_at(position: usize, input: String, error: String) -> Self {
        Self {
            position,
            input,
            output: String::new(),
            status: RowStatus::Fail,
            error,
        }
    }
}

/// Aggregate over all RowResults of one run, rows in source order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rows: Vec<RowResult>,
}

impl RunReport {
    pub fn from_rows(run_id: String, started_at: DateTime<Utc>, rows: Vec<RowResult>) -> Self {
        let total = rows.len();
        let succeeded = rows
            .iter()
            .filter(|r| r.status == RowStatus::Success)
            .count();
        let failed = rows.iter().filter(|r| r.status == RowStatus::Fail).count();
        let skipped = rows
            .iter()
            .filter(|r| r.status == RowStatus::Skipped)
            .count();
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            total,
            succeeded,
            failed,
            skipped,
            rows,
        }
    }
}
