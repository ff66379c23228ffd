// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval for the Concierge chat engine.
//!
//! [`ProductRetriever`] answers with an exact identifier or name match when the
//! query names a product, and falls back to semantic search otherwise. The
//! `product_search` tool ranks with [`ProductRetriever::hybrid_search`] instead.
//! [`KbRetriever`] returns locale-filtered, deduplicated knowledge chunks.

pub mod catalog;
pub mod context;
pub mod hybrid;
pub mod kb;
pub mod normalize;
pub mod product;

pub use catalog::{
    Catalog, CatalogItem, KnowledgeChunk, SiteTemplate, Variant, load_kb_dir, load_products,
    localized_text,
};
pub use hybrid::{HybridHit, HybridWeights};
pub use kb::{KbRetriever, ScoredChunk, render_hits};
pub use normalize::normalize;
pub use product::{ProductHits, ProductRetriever, RebuildReport, RetrievalMode, ScoredItem};
