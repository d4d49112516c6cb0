
use std::path::Path;

use tracing::{debug, info};

use crate::ingest::{ChunkRecord, load_chunk_records};
use crate::{RagError, Result};

/// Floor applied to row norms so zero vectors are clamped instead of divided
/// by zero.
const MIN_NORM: f32 = 1e-12;

/// In-memory cosine-similarity index over precomputed chunk embeddings.
///
/// Built once from a completed chunk+embedding file and read-only afterwards,
/// so it can be shared across any number of concurrent queries. Search is an
/// exhaustive scan; every stored row is unit-normalized at load time.
#[derive(Debug)]
pub struct VectorIndex {
    records: Vec<ChunkRecord>,
    embeddings: Vec<Vec<f32>>,
    dimension: usize,
}

/// A ranked query-time result. Transient, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub text: String,
    pub score: f32,
    pub source: Option<String>,
    pub pillar: Option<String>,
    pub summary: Option<String>,
}

impl VectorIndex {
    /// Load the index from a line-delimited chunk+embedding file.
    ///
    /// Every record must carry an `embedding` field of the same
    /// dimensionality; partial embedding coverage is not supported.
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let records = load_chunk_records(path)?;
        if records.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        let mut embeddings = Vec::with_capacity(records.len());
        let mut dimension = 0;

        for record in &records {
            let Some(vector) = record.embedding.as_ref() else {
                return Err(RagError::Embedding(format!(
                    "Record {} has no embedding; re-run the embedding pass",
                    record.chunk_id
                )));
            };

            if vector.is_empty() {
                return Err(RagError::Embedding(format!(
                    "Record {} has an empty embedding",
                    record.chunk_id
                )));
            }

            if dimension == 0 {
                dimension = vector.len();
            } else if vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }

            embeddings.push(normalize(vector));
        }

        info!(
            "Loaded vector index: {} chunks, {} dimensions, from {}",
            records.len(),
            dimension,
            path.display()
        );

        Ok(Self {
            records,
            embeddings,
            dimension,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Rank all stored chunks against the query vector by cosine similarity
    /// and return the `top_k` best, highest score first. Ties are broken by
    /// record order, lower index first.
    #[inline]
    pub fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if query_vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        let norm = query_vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(RagError::ZeroNormQuery);
        }

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_unit: Vec<f32> = query_vector.iter().map(|v| v / norm).collect();

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .map(|row| dot(row, &query_unit))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        debug!(
            "Ranked {} chunks, returning top {}",
            self.embeddings.len(),
            scored.len()
        );

        let results = scored
            .into_iter()
            .map(|(idx, score)| {
                let record = &self.records[idx];
                RetrievedChunk {
                    chunk_id: record.chunk_id.clone(),
                    text: record.text.clone(),
                    score,
                    source: Some(record.source.clone()).filter(|s| !s.is_empty()),
                    pillar: record.pillar.clone(),
                    summary: Some(record.summary.clone()).filter(|s| !s.is_empty()),
                }
            })
            .collect();

        Ok(results)
    }
}

fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt().max(MIN_NORM);
    vector.iter().map(|v| v / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
