// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector index for the Concierge chat engine.
//!
//! Exact cosine backends behind the [`VectorIndex`] trait, an atomically
//! swappable [`ActiveIndex`], and the content-hash [`EmbeddingCache`].

pub mod active;
pub mod backend;
pub mod cache;
pub mod similarity;

pub use active::{ActiveIndex, IndexSnapshot, exact_snapshot};
pub use backend::{ExactIndex, NormalizedIndex, SearchHits, VectorIndex, build_index};
pub use cache::{CacheStats, Document, EmbeddingCache, content_hash};
pub use similarity::{cosine_similarity, l2_normalize};
