// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomically swappable index snapshots.
//!
//! Readers load the current snapshot and keep it for the whole query. A rebuild
//! constructs a new snapshot and swaps the pointer, so no reader ever observes
//! a half-built index.

use std::sync::Arc;

use arc_swap::ArcSwap;
use concierge_core::ConciergeError;

use crate::backend::{ExactIndex, VectorIndex};

/// Items paired with the index built over their vectors (`items[i]` ↔ row `i`).
pub struct IndexSnapshot<T> {
    items: Vec<T>,
    index: Box<dyn VectorIndex>,
}

impl<T> IndexSnapshot<T> {
    pub fn new(items: Vec<T>, index: Box<dyn VectorIndex>) -> Result<Self, ConciergeError> {
        if items.len() != index.len() {
            return Err(ConciergeError::Internal(format!(
                "index has {} rows for {} items",
                index.len(),
                items.len()
            )));
        }
        Ok(Self { items, index })
    }

    pub fn empty() -> Self {
        Self::unindexed(Vec::new())
    }

    /// Items available for lookup but not yet embedded; searches return nothing.
    pub fn unindexed(items: Vec<T>) -> Self {
        Self {
            items,
            index: Box::new(EmptyIndex),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether vectors have been built for the items.
    pub fn is_indexed(&self) -> bool {
        !self.index.is_empty()
    }

    /// Top-`k` items with their similarity scores, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(&T, f32)> {
        self.index
            .search(query, k)
            .iter()
            .filter_map(|(i, score)| self.items.get(i).map(|item| (item, score)))
            .collect()
    }
}

struct EmptyIndex;

impl VectorIndex for EmptyIndex {
    fn len(&self) -> usize {
        0
    }

    fn dim(&self) -> usize {
        0
    }

    fn search(&self, _query: &[f32], _k: usize) -> crate::backend::SearchHits {
        crate::backend::SearchHits::default()
    }
}

/// The index currently serving queries.
pub struct ActiveIndex<T> {
    current: ArcSwap<IndexSnapshot<T>>,
}

impl<T> ActiveIndex<T> {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(IndexSnapshot::empty()),
        }
    }

    /// The current snapshot. Holding it keeps that generation alive.
    pub fn load(&self) -> Arc<IndexSnapshot<T>> {
        self.current.load_full()
    }

    /// Publish a new snapshot, returning the one it replaced.
    pub fn swap(&self, snapshot: IndexSnapshot<T>) -> Arc<IndexSnapshot<T>> {
        self.current.swap(Arc::new(snapshot))
    }
}

impl<T> Default for ActiveIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience for tests and small catalogs: exact index over `(item, vector)` pairs.
pub fn exact_snapshot<T>(pairs: Vec<(T, Vec<f32>)>) -> Result<IndexSnapshot<T>, ConciergeError> {
    let (items, vectors): (Vec<T>, Vec<Vec<f32>>) = pairs.into_iter().unzip();
    IndexSnapshot::new(items, Box::new(ExactIndex::build(vectors)?))
}
