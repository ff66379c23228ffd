// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exact nearest-neighbor backends.
//!
//! Both backends rank by cosine similarity and return results sorted
//! descending. An empty index or `k == 0` yields empty results.

use concierge_config::model::IndexBackend;
use concierge_core::ConciergeError;

use crate::similarity::{MIN_NORM, dot, l2_normalize, norm};

/// Ranked search results. `scores[i]` belongs to `indices[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub scores: Vec<f32>,
    pub indices: Vec<usize>,
}

impl SearchHits {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Iterate `(index, score)` pairs in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices.iter().copied().zip(self.scores.iter().copied())
    }
}

/// A nearest-neighbor index over fixed-dimension vectors.
pub trait VectorIndex: Send + Sync {
    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension, 0 when empty.
    fn dim(&self) -> usize;

    /// Top-`k` vectors by cosine similarity to `query`.
    fn search(&self, query: &[f32], k: usize) -> SearchHits;
}

fn check_dims(vectors: &[Vec<f32>]) -> Result<usize, ConciergeError> {
    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(ConciergeError::Validation(format!(
            "vector {i} has dimension {}, expected {dim}",
            v.len()
        )));
    }
    Ok(dim)
}

fn top_k(mut scored: Vec<(usize, f32)>, k: usize) -> SearchHits {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);
    let (indices, scores) = scored.into_iter().unzip();
    SearchHits { scores, indices }
}

/// Raw vectors with precomputed norms; cosine computed per query.
pub struct ExactIndex {
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    dim: usize,
}

impl ExactIndex {
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, ConciergeError> {
        let dim = check_dims(&vectors)?;
        let norms = vectors.iter().map(|v| norm(v).max(MIN_NORM)).collect();
        Ok(Self {
            vectors,
            norms,
            dim,
        })
    }
}

impl VectorIndex for ExactIndex {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn search(&self, query: &[f32], k: usize) -> SearchHits {
        if k == 0 || self.vectors.is_empty() || query.len() != self.dim {
            return SearchHits::default();
        }
        let q_norm = norm(query).max(MIN_NORM);
        let scored = self
            .vectors
            .iter()
            .zip(self.norms.iter())
            .enumerate()
            .map(|(i, (v, n))| (i, dot(query, v) / (q_norm * n)))
            .collect();
        top_k(scored, k)
    }
}

/// Vectors normalized at build time; search is an inner product.
pub struct NormalizedIndex {
    vectors: Vec<Vec<f32>>,
    dim: usize,
}

impl NormalizedIndex {
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, ConciergeError> {
        let dim = check_dims(&vectors)?;
        Ok(Self {
            vectors: vectors.iter().map(|v| l2_normalize(v)).collect(),
            dim,
        })
    }
}

impl VectorIndex for NormalizedIndex {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn search(&self, query: &[f32], k: usize) -> SearchHits {
        if k == 0 || self.vectors.is_empty() || query.len() != self.dim {
            return SearchHits::default();
        }
        let q = l2_normalize(query);
        let scored = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&q, v)))
            .collect();
        top_k(scored, k)
    }
}

/// Build the configured backend.
pub fn build_index(
    backend: IndexBackend,
    vectors: Vec<Vec<f32>>,
) -> Result<Box<dyn VectorIndex>, ConciergeError> {
    Ok(match backend {
        IndexBackend::Exact => Box::new(ExactIndex::build(vectors)?),
        IndexBackend::Normalized => Box::new(NormalizedIndex::build(vectors)?),
    })
}
