//! Batch driver.
//!
//! Fetches all rows once, processes them through a bounded worker pool, and
//! writes results back in one batched sheet update (plus optional document
//! appends). Exactly one RowResult per row; the report lists rows in source
//! order regardless of completion order. Per-row failures never abort the
//! run; only errors before row iteration are fatal.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::core::config::settings::{RunSettings, SheetsSettings};
use crate::core::errors::ApiError;
use crate::gdocs::DocumentSink;
use crate::pipeline::context::ContextAccumulator;
use crate::pipeline::row::RowProcessor;
use crate::pipeline::types::{RowResult, RowStatus, RunReport};
use crate::sheets::{column_letter, CellUpdate, SheetRef, TabularSource};

pub struct BatchDriver {
    processor: Arc<RowProcessor>,
    sheets: Arc<dyn TabularSource>,
    docs: Arc<dyn DocumentSink>,
    sheet_name: String,
    output_column: String,
    concurrency: usize,
    history_window: usize,
}

impl BatchDriver {
    pub fn new(
        processor: Arc<RowProcessor>,
        sheets: Arc<dyn TabularSource>,
        docs: Arc<dyn DocumentSink>,
        run_settings: &RunSettings,
        sheets_settings: &SheetsSettings,
    ) -> Self {
        Self {
            processor,
            sheets,
            docs,
            sheet_name: sheets_settings.sheet_name.clone(),
            output_column: run_settings.output_column.clone(),
            concurrency: run_settings.concurrency.max(1),
            history_window: run_settings.history_window,
        }
    }

    pub async fn run(
        &self,
        spreadsheet_id: &str,
        document_id: Option<&str>,
    ) -> Result<RunReport, ApiError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let sheet = SheetRef {
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: self.sheet_name.clone(),
        };

        // Header discovery runs once, before any row work; the resolved
        // column letter is reused for every write this run.
        let output_letter = self.resolve_output_column(&sheet).await?;

        let rows = self.sheets.fetch_rows(&sheet).await?;
        if rows.is_empty() {
            return Err(ApiError::BadRequest(
                "source sheet has no requirement rows".to_string(),
            ));
        }
        let total = rows.len();
        tracing::info!(run_id = %run_id, total, "starting run");

        let history = Arc::new(ContextAccumulator::new());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let mut tasks = Vec::with_capacity(total);
        for row in rows {
            let semaphore = Arc::clone(&semaphore);
            let history = Arc::clone(&history);
            let processor = Arc::clone(&self.processor);
            let window = self.history_window;
            let position = row.position;
            let input = row.requirement.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return RowResult::fail_at(
                            row.position,
                            row.requirement.clone(),
                            "worker pool closed before the row could run".to_string(),
                        )
                    }
                };
                // Best-effort snapshot: whatever has completed by now.
                let snapshot = history.recent(window);
                let result = processor.process(&row, &snapshot).await;
                if result.status == RowStatus::Success {
                    history.append(result.output.clone());
                }
                result
            });
            tasks.push((position, input, handle));
        }

        let mut results = Vec::with_capacity(total);
        for (position, input, handle) in tasks {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => {
                    RowResult::fail_at(position, input, format!("row task aborted: {}", err))
                }
            };
            results.push(result);
        }

        // Keyed by source position, independent of completion order.
        results.sort_by_key(|result| result.position);

        self.write_back(&sheet, &output_letter, &results).await?;
        if let Some(document_id) = document_id {
            self.append_to_document(document_id, &results).await?;
        }

        let report = RunReport::from_rows(run_id, started_at, results);
        tracing::info!(
            run_id = %report.run_id,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "run finished"
        );
        Ok(report)
    }

    /// Finds the output column in the header, appending it when absent, and
    /// returns its column letter.
    async fn resolve_output_column(&self, sheet: &SheetRef) -> Result<String, ApiError> {
        let mut header = self.sheets.read_header(sheet).await?;

        let position = match header.iter().position(|name| name == &self.output_column) {
            Some(idx) => idx + 1,
            None => {
                header.push(self.output_column.clone());
                self.sheets.write_header(sheet, &header).await?;
                header.len()
            }
        };

        Ok(column_letter(position))
    }

    async fn write_back(
        &self,
        sheet: &SheetRef,
        output_letter: &str,
        results: &[RowResult],
    ) -> Result<(), ApiError> {
        let updates: Vec<CellUpdate> = results
            .iter()
            .filter_map(|result| {
                let value = match result.status {
                    RowStatus::Success => result.output.clone(),
                    RowStatus::Fail => format!("fail: {}", result.error),
                    // Skipped rows keep whatever the cell already holds.
                    RowStatus::Skipped => return None,
                };
                Some(CellUpdate {
                    range: format!(
                        "{}!{}{}",
                        sheet.sheet_name, output_letter, result.position
                    ),
                    value,
                })
            })
            .collect();

        if updates.is_empty() {
            return Ok(());
        }
        self.sheets.write_cells(sheet, &updates).await
    }

    async fn append_to_document(
        &self,
        document_id: &str,
        results: &[RowResult],
    ) -> Result<(), ApiError> {
        for result in results {
            if result.status != RowStatus::Success {
                continue;
            }
            let block = format!("{}\n{}\n\n", result.input.trim(), result.output);
            self.docs.append(document_id, &block).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::settings::{LlmSettings, RetrievalSettings};
    use crate::llm::types::ChatRequest;
    use crate::llm::LlmClient;
    use crate::pipeline::types::Row;
    use crate::rag::index::{SearchHit, VectorIndex};
    use crate::rag::Retriever;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StubIndex;

    #[async_trait]
    impl VectorIndex for StubIndex {
        async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<SearchHit>, ApiError> {
            Ok(vec![SearchHit {
                index: 0,
                distance: 0.0,
            }])
        }
    }

    /// Answers "answer <requirement>"; configurable per-requirement failure
    /// and per-row delays to force out-of-order completion.
    struct ScriptedLlm {
        fail_on: Option<String>,
        delays_ms: Vec<(String, u64)>,
        seen_systems: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedLlm {
        fn new() -> Self {
            Self {
                fail_on: None,
                delays_ms: Vec::new(),
                seen_systems: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(requirement: &str) -> Self {
            Self {
                fail_on: Some(requirement.to_string()),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(true)
        }

        async fn embed(&self, _input: &str) -> Result<Vec<f32>, ApiError> {
            Ok(vec![1.0, 0.0])
        }

        async fn complete(&self, request: ChatRequest) -> Result<String, ApiError> {
            let system = request.messages[0].content.clone();
            let user = request.messages[1].content.clone();

            if let Some((_, delay)) = self.delays_ms.iter().find(|(req, _)| *req == user) {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
            }

            self.seen_systems
                .lock()
                .expect("lock")
                .push((user.clone(), system));

            if self.fail_on.as_deref() == Some(user.as_str()) {
                return Err(ApiError::Upstream("generation blew up".to_string()));
            }
            Ok(format!("answer {}", user))
        }
    }

    #[derive(Default)]
    struct SheetState {
        header: Vec<String>,
        rows: Vec<Row>,
        header_writes: usize,
        cell_writes: Vec<Vec<CellUpdate>>,
    }

    struct FakeSheets {
        state: Mutex<SheetState>,
    }

    impl FakeSheets {
        fn with_rows(header: Vec<&str>, requirements: Vec<&str>) -> Self {
            let rows = requirements
                .iter()
                .enumerate()
                .map(|(i, req)| Row {
                    position: i + 2,
                    requirement: req.to_string(),
                    draft: None,
                })
                .collect();
            Self {
                state: Mutex::new(SheetState {
                    header: header.into_iter().map(String::from).collect(),
                    rows,
                    ..SheetState::default()
                }),
            }
        }
    }

    #[async_trait]
    impl TabularSource for FakeSheets {
        async fn read_header(&self, _sheet: &SheetRef) -> Result<Vec<String>, ApiError> {
            Ok(self.state.lock().expect("lock").header.clone())
        }

        async fn write_header(
            &self,
            _sheet: &SheetRef,
            header: &[String],
        ) -> Result<(), ApiError> {
            let mut state = self.state.lock().expect("lock");
            state.header = header.to_vec();
            state.header_writes += 1;
            Ok(())
        }

        async fn fetch_rows(&self, _sheet: &SheetRef) -> Result<Vec<Row>, ApiError> {
            Ok(self.state.lock().expect("lock").rows.clone())
        }

        async fn write_cells(
            &self,
            _sheet: &SheetRef,
            updates: &[CellUpdate],
        ) -> Result<(), ApiError> {
            self.state
                .lock()
                .expect("lock")
                .cell_writes
                .push(updates.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDocs {
        appended: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentSink for FakeDocs {
        async fn append(&self, _document_id: &str, text: &str) -> Result<(), ApiError> {
            self.appended.lock().expect("lock").push(text.to_string());
            Ok(())
        }
    }

    fn driver_with(
        llm: Arc<ScriptedLlm>,
        sheets: Arc<FakeSheets>,
        docs: Arc<FakeDocs>,
        concurrency: usize,
    ) -> BatchDriver {
        let retriever = Arc::new(Retriever::new(
            vec!["reference passage".to_string()],
            Arc::new(StubIndex),
        ));
        let processor = Arc::new(RowProcessor::new(
            llm,
            retriever,
            &LlmSettings::default(),
            &RetrievalSettings::default(),
        ));
        let run_settings = RunSettings {
            concurrency,
            ..RunSettings::default()
        };
        BatchDriver::new(
            processor,
            sheets,
            docs,
            &run_settings,
            &SheetsSettings::default(),
        )
    }

    #[tokio::test]
    async fn blank_row_is_skipped_and_counts_partition() {
        let sheets = Arc::new(FakeSheets::with_rows(
            vec!["Requirement", "Answer"],
            vec!["Req A", "", " Req C "],
        ));
        let driver = driver_with(
            Arc::new(ScriptedLlm::new()),
            sheets.clone(),
            Arc::new(FakeDocs::default()),
            5,
        );

        let report = driver.run("sheet-1", None).await.expect("run");

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.rows[1].status, RowStatus::Skipped);
        assert!(report.rows[1].output.is_empty());

        // skipped row gets no cell update
        let state = sheets.state.lock().expect("lock");
        let updates = &state.cell_writes[0];
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|u| !u.range.ends_with("B3")));
    }

    #[tokio::test]
    async fn generation_failure_is_contained_to_its_row() {
        let sheets = Arc::new(FakeSheets::with_rows(
            vec!["Requirement", "Answer"],
            vec!["Req A", "Req B", "Req C"],
        ));
        let driver = driver_with(
            Arc::new(ScriptedLlm::failing_on("Req B")),
            sheets.clone(),
            Arc::new(FakeDocs::default()),
            5,
        );

        let report = driver.run("sheet-1", None).await.expect("run");

        assert_eq!(report.rows[0].status, RowStatus::Success);
        assert_eq!(report.rows[1].status, RowStatus::Fail);
        assert!(!report.rows[1].error.is_empty());
        assert_eq!(report.rows[2].status, RowStatus::Success);

        // the failed row's cell carries the error marker
        let state = sheets.state.lock().expect("lock");
        let failed_cell = state.cell_writes[0]
            .iter()
            .find(|u| u.range.ends_with("3"))
            .expect("cell for row 3");
        assert!(failed_cell.value.starts_with("fail: "));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn report_is_in_source_order_despite_completion_order() {
        let mut llm = ScriptedLlm::new();
        // first row finishes last
        llm.delays_ms = vec![("Req A".to_string(), 80), ("Req B".to_string(), 20)];
        let sheets = Arc::new(FakeSheets::with_rows(
            vec!["Requirement", "Answer"],
            vec!["Req A", "Req B", "Req C", "Req D"],
        ));
        let driver = driver_with(
            Arc::new(llm),
            sheets.clone(),
            Arc::new(FakeDocs::default()),
            4,
        );

        let report = driver.run("sheet-1", None).await.expect("run");

        let positions: Vec<usize> = report.rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![2, 3, 4, 5]);
        assert_eq!(report.total, 4);
        assert_eq!(report.succeeded, 4);
    }

    #[tokio::test]
    async fn empty_source_is_fatal() {
        let sheets = Arc::new(FakeSheets::with_rows(vec!["Requirement", "Answer"], vec![]));
        let driver = driver_with(
            Arc::new(ScriptedLlm::new()),
            sheets,
            Arc::new(FakeDocs::default()),
            5,
        );

        let err = driver.run("sheet-1", None).await.expect_err("fatal");
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn output_column_is_created_when_missing() {
        let sheets = Arc::new(FakeSheets::with_rows(vec!["Requirement"], vec!["Req A"]));
        let driver = driver_with(
            Arc::new(ScriptedLlm::new()),
            sheets.clone(),
            Arc::new(FakeDocs::default()),
            5,
        );

        driver.run("sheet-1", None).await.expect("run");

        let state = sheets.state.lock().expect("lock");
        assert_eq!(state.header, vec!["Requirement", "Answer"]);
        assert_eq!(state.header_writes, 1);
        // appended as column 2 → letter B
        assert_eq!(state.cell_writes[0][0].range, "Sheet1!B2");
    }

    #[tokio::test]
    async fn existing_output_column_is_reused() {
        let sheets = Arc::new(FakeSheets::with_rows(
            vec!["Requirement", "Notes", "Answer"],
            vec!["Req A"],
        ));
        let driver = driver_with(
            Arc::new(ScriptedLlm::new()),
            sheets.clone(),
            Arc::new(FakeDocs::default()),
            5,
        );

        driver.run("sheet-1", None).await.expect("run");

        let state = sheets.state.lock().expect("lock");
        assert_eq!(state.header_writes, 0);
        assert_eq!(state.cell_writes[0][0].range, "Sheet1!C2");
    }

    #[tokio::test]
    async fn prompt_history_is_bounded_to_the_recent_window() {
        let llm = Arc::new(ScriptedLlm::new());
        let sheets = Arc::new(FakeSheets::with_rows(
            vec!["Requirement", "Answer"],
            vec!["Req 1", "Req 2", "Req 3", "Req 4", "Req 5", "Req 6"],
        ));
        // concurrency 1 keeps completion order equal to source order
        let driver = driver_with(llm.clone(), sheets, Arc::new(FakeDocs::default()), 1);

        driver.run("sheet-1", None).await.expect("run");

        let seen = llm.seen_systems.lock().expect("lock");
        let (_, sixth_system) = seen
            .iter()
            .find(|(user, _)| user == "Req 6")
            .expect("row 6 prompt");
        assert!(sixth_system.contains("answer Req 3"));
        assert!(sixth_system.contains("answer Req 4"));
        assert!(sixth_system.contains("answer Req 5"));
        assert!(!sixth_system.contains("answer Req 1"));
        assert!(!sixth_system.contains("answer Req 2"));
    }

    #[tokio::test]
    async fn successful_answers_are_appended_to_the_document_in_order() {
        let sheets = Arc::new(FakeSheets::with_rows(
            vec!["Requirement", "Answer"],
            vec!["Req A", "", "Req C"],
        ));
        let docs = Arc::new(FakeDocs::default());
        let driver = driver_with(Arc::new(ScriptedLlm::new()), sheets, docs.clone(), 5);

        driver.run("sheet-1", Some("doc-1")).await.expect("run");

        let appended = docs.appended.lock().expect("lock");
        assert_eq!(appended.len(), 2);
        assert!(appended[0].starts_with("Req A\n"));
        assert!(appended[1].starts_with("Req C\n"));
    }
}
