// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::ConciergeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Adapter for turning text into vectors.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Identifier of the embedding model. Part of every cache key.
    fn model(&self) -> &str;

    /// Generates embeddings for the given input, one vector per text, in order.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, ConciergeError>;
}
