// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector math shared by the index backends and the intent router.

/// Norms below this are treated as this value to avoid division by zero.
pub const MIN_NORM: f32 = 1e-12;

/// Euclidean norm.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length. Zero vectors stay zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let n = norm(v).max(MIN_NORM);
    v.iter().map(|x| x / n).collect()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity. Returns 0.0 when either vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    dot(a, b) / (norm(a).max(MIN_NORM) * norm(b).max(MIN_NORM))
}

/// Element-wise mean of equally sized vectors. `None` when `vectors` is empty.
pub fn mean(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut acc = vec![0.0f32; first.len()];
    for v in vectors {
        for (a, x) in acc.iter_mut().zip(v.iter()) {
            *a += x;
        }
    }
    let n = vectors.len() as f32;
    Some(acc.into_iter().map(|x| x / n).collect())
}
