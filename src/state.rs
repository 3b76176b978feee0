use std::sync::Arc;

use anyhow::Context;

use crate::core::config::{AppPaths, Settings};
use crate::gdocs::{DocumentSink, GoogleDocsClient};
use crate::llm::{LlmClient, OpenAiClient};
use crate::pipeline::{BatchDriver, RowProcessor};
use crate::rag::{Corpus, FlatIndex, Retriever, VectorIndex};
use crate::sheets::{GoogleSheetsClient, TabularSource};

/// Global application state shared across all routes.
///
/// Everything here is constructed once at startup and read-only afterwards;
/// per-run mutable state (context history, report) lives inside each run.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<Settings>,
    pub llm: Arc<dyn LlmClient>,
    pub retriever: Arc<Retriever>,
    pub driver: Arc<BatchDriver>,
}

impl AppState {
    /// Initializes the application state:
    /// 1. Paths and configuration
    /// 2. Reference corpus and its vector index
    /// 3. External service clients (LLM, Sheets, Docs)
    /// 4. The row processor and batch driver
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        let paths = Arc::new(AppPaths::new());
        let settings = Arc::new(Settings::load(&paths)?);

        let corpus_path = paths.resolve(&settings.retrieval.corpus_path);
        let corpus = Corpus::load(&corpus_path).context("failed to load reference corpus")?;
        if corpus.is_empty() {
            tracing::warn!(
                "corpus at {} is empty; retrieval will return no passages",
                corpus_path.display()
            );
        }

        let (passages, vectors) = corpus.into_parts();
        let index: Arc<dyn VectorIndex> = Arc::new(FlatIndex::new(vectors));
        let retriever = Arc::new(Retriever::new(passages, index));

        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(&settings.llm)?);
        let sheets: Arc<dyn TabularSource> = Arc::new(GoogleSheetsClient::new(&settings.sheets)?);
        let docs: Arc<dyn DocumentSink> = Arc::new(GoogleDocsClient::new(&settings.docs)?);

        let processor = Arc::new(RowProcessor::new(
            llm.clone(),
            retriever.clone(),
            &settings.llm,
            &settings.retrieval,
        ));
        let driver = Arc::new(BatchDriver::new(
            processor,
            sheets,
            docs,
            &settings.run,
            &settings.sheets,
        ));

        Ok(Arc::new(AppState {
            paths,
            settings,
            llm,
            retriever,
            driver,
        }))
    }
}
