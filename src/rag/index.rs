//! Nearest-neighbor search over the corpus vectors.
//!
//! `VectorIndex` is the seam to the index service; `FlatIndex` is the
//! in-process implementation, an exhaustive cosine-distance scan. Hits come
//! back ranked by ascending distance (nearest first).

use async_trait::async_trait;

use crate::core::errors::ApiError;

/// One search hit: a corpus index and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub index: usize,
    pub distance: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `k` hits ranked by ascending distance.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, ApiError>;
}

/// Exhaustive scan over the full vector set.
pub struct FlatIndex {
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self { vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, ApiError> {
        if self.vectors.is_empty() || query.is_empty() {
            return Ok(vec![]);
        }

        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| SearchHit {
                index,
                distance: 1.0 - cosine_similarity(query, vector) as f32,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
