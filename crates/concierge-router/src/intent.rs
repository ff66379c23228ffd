// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding-centroid intent classifier.
//!
//! Each configured intent is represented by the L2-normalized mean of its
//! example embeddings. A query is routed to the nearest centroid when the
//! cosine similarity clears the configured minimum.

use std::collections::BTreeMap;
use std::sync::Arc;

use concierge_config::model::IntentConfig;
use concierge_core::{ConciergeError, EmbeddingAdapter, EmbeddingInput};
use concierge_index::similarity::{l2_normalize, mean};
use concierge_index::{ActiveIndex, IndexSnapshot, NormalizedIndex};
use tracing::{debug, info, warn};

/// The router's verdict for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentMatch {
    pub intent: String,
    pub score: f32,
    pub is_broad: bool,
    pub is_tech: bool,
}

#[derive(Debug, Clone)]
struct IntentEntry {
    name: String,
    is_broad: bool,
    is_tech: bool,
}

pub struct IntentRouter {
    embedder: Arc<dyn EmbeddingAdapter>,
    active: ActiveIndex<IntentEntry>,
    min_score: f32,
    batch_size: usize,
}

impl IntentRouter {
    pub fn new(embedder: Arc<dyn EmbeddingAdapter>, min_score: f32, batch_size: usize) -> Self {
        Self {
            embedder,
            active: ActiveIndex::new(),
            min_score,
            batch_size: batch_size.max(1),
        }
    }

    /// Number of routable intents.
    pub fn len(&self) -> usize {
        self.active.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embed every intent's examples and swap in the centroid index.
    ///
    /// Intents without usable examples are skipped. Returns the number of
    /// intents that became routable.
    pub async fn build(
        &self,
        intents: &BTreeMap<String, IntentConfig>,
    ) -> Result<usize, ConciergeError> {
        let mut entries = Vec::new();
        let mut texts: Vec<String> = Vec::new();
        let mut spans = Vec::new();
        for (name, config) in intents {
            let examples: Vec<String> = config
                .examples
                .iter()
                .map(|e| e.trim())
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            if examples.is_empty() {
                warn!(intent = %name, "intent has no examples, skipping");
                continue;
            }
            spans.push(texts.len()..texts.len() + examples.len());
            texts.extend(examples);
            entries.push(IntentEntry {
                name: name.clone(),
                is_broad: config.is_broad,
                is_tech: config.is_tech,
            });
        }

        if entries.is_empty() {
            self.active.swap(IndexSnapshot::empty());
            info!("no intent examples configured, router inactive");
            return Ok(0);
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let output = self
                .embedder
                .embed(EmbeddingInput {
                    texts: batch.to_vec(),
                })
                .await?;
            if output.embeddings.len() != batch.len() {
                return Err(ConciergeError::embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    output.embeddings.len()
                )));
            }
            vectors.extend(output.embeddings);
        }

        let mut kept = Vec::with_capacity(entries.len());
        let mut centroids = Vec::with_capacity(entries.len());
        for (entry, span) in entries.into_iter().zip(spans) {
            match mean(&vectors[span]) {
                Some(centroid) => {
                    centroids.push(l2_normalize(&centroid));
                    kept.push(entry);
                }
                None => warn!(intent = %entry.name, "intent centroid undefined, skipping"),
            }
        }

        let count = kept.len();
        let index = NormalizedIndex::build(centroids)?;
        self.active.swap(IndexSnapshot::new(kept, Box::new(index))?);
        info!(intents = count, examples = texts.len(), "intent router built");
        Ok(count)
    }

    /// Nearest intent for `query`, or `None` when the router is inactive,
    /// the query is blank, or the best score is below the minimum.
    pub async fn route(&self, query: &str) -> Result<Option<IntentMatch>, ConciergeError> {
        let query = query.trim();
        let snapshot = self.active.load();
        if query.is_empty() || !snapshot.is_indexed() {
            return Ok(None);
        }
        let output = self
            .embedder
            .embed(EmbeddingInput {
                texts: vec![query.to_string()],
            })
            .await?;
        let vector = output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ConciergeError::embedding("embedding returned no vectors"))?;

        let best = snapshot.search(&l2_normalize(&vector), 1).into_iter().next();
        match best {
            Some((entry, score)) if score >= self.min_score => {
                debug!(intent = %entry.name, score, "intent routed");
                Ok(Some(IntentMatch {
                    intent: entry.name.clone(),
                    score,
                    is_broad: entry.is_broad,
                    is_tech: entry.is_tech,
                }))
            }
            Some((entry, score)) => {
                debug!(intent = %entry.name, score, "best intent below minimum");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
