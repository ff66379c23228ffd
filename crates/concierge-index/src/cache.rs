// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding cache in front of the embedding provider.
//!
//! Lookups happen before any provider call. Only misses are embedded (in
//! batches, each distinct key once), then written back. A stored hash that
//! differs from the current content hash counts as a miss.

use std::collections::HashMap;
use std::sync::Arc;

use concierge_core::{
    CacheNamespace, CachedEmbedding, ConciergeError, EmbeddingAdapter, EmbeddingInput,
    StorageAdapter,
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Hex SHA-256 of a document text.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// A document to embed: cache key plus its text.
#[derive(Debug, Clone)]
pub struct Document {
    pub key: String,
    pub text: String,
}

/// Cache hit/miss counters for one `embed_documents` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

pub struct EmbeddingCache {
    storage: Arc<dyn StorageAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
    batch_size: usize,
}

impl EmbeddingCache {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        batch_size: usize,
    ) -> Self {
        Self {
            storage,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    pub fn model(&self) -> &str {
        self.embedder.model()
    }

    /// Embed a single query text. Queries are never cached.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ConciergeError> {
        let output = self
            .embedder
            .embed(EmbeddingInput {
                texts: vec![text.to_string()],
            })
            .await?;
        output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ConciergeError::embedding("embedding returned no vectors"))
    }

    /// Embed catalog items keyed by item id.
    pub async fn embed_products(
        &self,
        docs: &[Document],
    ) -> Result<(Vec<Vec<f32>>, CacheStats), ConciergeError> {
        self.embed_documents(CacheNamespace::Product, docs).await
    }

    /// Embed knowledge chunk texts; the key is the content hash.
    pub async fn embed_chunks(
        &self,
        texts: &[String],
    ) -> Result<(Vec<Vec<f32>>, CacheStats), ConciergeError> {
        let docs: Vec<Document> = texts
            .iter()
            .map(|t| Document {
                key: content_hash(t),
                text: t.clone(),
            })
            .collect();
        self.embed_documents(CacheNamespace::Knowledge, &docs).await
    }

    /// Return one vector per document, in order.
    pub async fn embed_documents(
        &self,
        namespace: CacheNamespace,
        docs: &[Document],
    ) -> Result<(Vec<Vec<f32>>, CacheStats), ConciergeError> {
        let model = self.embedder.model().to_string();
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; docs.len()];
        let mut stats = CacheStats::default();
        // key -> (hash, text, positions waiting on it)
        let mut pending: HashMap<&str, (String, &str, Vec<usize>)> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();

        for (pos, doc) in docs.iter().enumerate() {
            let hash = content_hash(&doc.text);
            let cached = match self
                .storage
                .get_cached_embedding(namespace, &doc.key, &model)
                .await
            {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(key = %doc.key, error = %e, "embedding cache read failed");
                    None
                }
            };
            match cached {
                Some(entry) if entry.content_hash == hash => {
                    stats.hits += 1;
                    vectors[pos] = Some(entry.vector);
                }
                _ => {
                    stats.misses += 1;
                    pending
                        .entry(doc.key.as_str())
                        .or_insert_with(|| {
                            order.push(doc.key.as_str());
                            (hash, doc.text.as_str(), Vec::new())
                        })
                        .2
                        .push(pos);
                }
            }
        }

        for batch in order.chunks(self.batch_size) {
            let texts: Vec<String> = batch
                .iter()
                .filter_map(|k| pending.get(k).map(|(_, text, _)| text.to_string()))
                .collect();
            let output = self.embedder.embed(EmbeddingInput { texts }).await?;
            if output.embeddings.len() != batch.len() {
                return Err(ConciergeError::embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    output.embeddings.len()
                )));
            }
            for (key, vector) in batch.iter().zip(output.embeddings) {
                let Some((hash, _, positions)) = pending.get(key) else {
                    continue;
                };
                let entry = CachedEmbedding {
                    content_hash: hash.clone(),
                    vector,
                };
                if let Err(e) = self
                    .storage
                    .put_cached_embedding(namespace, key, &model, &entry)
                    .await
                {
                    warn!(key = %key, error = %e, "embedding cache write failed");
                }
                for &pos in positions {
                    vectors[pos] = Some(entry.vector.clone());
                }
            }
        }

        debug!(
            namespace = %namespace,
            hits = stats.hits,
            misses = stats.misses,
            "embedding cache consulted"
        );

        let vectors = vectors
            .into_iter()
            .map(|v| v.ok_or_else(|| ConciergeError::Internal("missing embedding".into())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((vectors, stats))
    }
}
