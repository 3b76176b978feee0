use std::sync::Arc;

use super::index::VectorIndex;
use crate::core::errors::ApiError;

/// Up to k passages ranked nearest-first.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub passages: Vec<String>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Maps index hits back to corpus passages. Read-only after construction,
/// safe to share across concurrently-processed rows.
pub struct Retriever {
    passages: Vec<String>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(passages: Vec<String>, index: Arc<dyn VectorIndex>) -> Self {
        Self { passages, index }
    }

    pub fn passage_count(&self) -> usize {
        self.passages.len()
    }

    pub async fn retrieve(&self, query: &[f32], k: usize) -> Result<RetrievalResult, ApiError> {
        let hits = self.index.search(query, k).await?;

        // Indices past the corpus boundary can appear when the index file and
        // corpus file are out of sync; drop them rather than dereference.
        let passages = hits
            .into_iter()
            .filter(|hit| hit.index < self.passages.len())
            .map(|hit| self.passages[hit.index].clone())
            .collect();

        Ok(RetrievalResult { passages })
    }
}
