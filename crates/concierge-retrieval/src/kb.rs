// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge-base retrieval: oversample, filter to locale, dedupe by chunk id.

use std::collections::HashSet;
use std::sync::Arc;

use concierge_config::model::IndexBackend;
use concierge_core::ConciergeError;
use concierge_index::{ActiveIndex, EmbeddingCache, IndexSnapshot, build_index};
use tracing::{debug, info};

use crate::catalog::KnowledgeChunk;
use crate::context::render_chunks;
use crate::product::RebuildReport;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: KnowledgeChunk,
    pub score: f32,
}

/// Render retrieved chunks as a prompt context block.
pub fn render_hits(hits: &[ScoredChunk]) -> String {
    render_chunks(hits.iter().map(|h| &h.chunk))
}

pub struct KbRetriever {
    active: ActiveIndex<KnowledgeChunk>,
    cache: Arc<EmbeddingCache>,
    backend: IndexBackend,
    oversample: usize,
    oversample_cap: usize,
}

impl KbRetriever {
    pub fn new(
        cache: Arc<EmbeddingCache>,
        backend: IndexBackend,
        oversample: usize,
        oversample_cap: usize,
    ) -> Self {
        Self {
            active: ActiveIndex::new(),
            cache,
            backend,
            oversample: oversample.max(1),
            oversample_cap: oversample_cap.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.active.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embed the chunks (through the cache) and swap in a new index.
    pub async fn rebuild(
        &self,
        chunks: Vec<KnowledgeChunk>,
    ) -> Result<RebuildReport, ConciergeError> {
        if chunks.is_empty() {
            self.active.swap(IndexSnapshot::empty());
            return Ok(RebuildReport::default());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let (vectors, stats) = self.cache.embed_chunks(&texts).await?;
        let index = build_index(self.backend, vectors)?;
        let count = chunks.len();
        self.active.swap(IndexSnapshot::new(chunks, index)?);
        info!(
            chunks = count,
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            "kb index rebuilt"
        );
        Ok(RebuildReport {
            items: count,
            cache: stats,
        })
    }

    pub async fn reindex(&self) -> Result<RebuildReport, ConciergeError> {
        let chunks = self.active.load().items().to_vec();
        self.rebuild(chunks).await
    }

    /// Top-`k` chunks visible in `locale`, at most one per chunk id.
    pub async fn retrieve(
        &self,
        query: &str,
        locale: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, ConciergeError> {
        let snapshot = self.active.load();
        if k == 0 || !snapshot.is_indexed() || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let candidates = k
            .saturating_mul(self.oversample)
            .min(self.oversample_cap)
            .max(k)
            .min(snapshot.len());
        let vector = self.cache.embed_query(query).await?;

        let mut seen = HashSet::new();
        let hits: Vec<ScoredChunk> = snapshot
            .search(&vector, candidates)
            .into_iter()
            .filter(|(chunk, _)| chunk.visible_in(locale))
            .filter(|(chunk, _)| seen.insert(chunk.id.clone()))
            .take(k)
            .map(|(chunk, score)| ScoredChunk {
                chunk: chunk.clone(),
                score,
            })
            .collect();
        debug!(candidates, returned = hits.len(), locale, "kb retrieval");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_test_utils::{MemoryStorage, MockEmbedder};
    use serde_json::json;

    fn chunk(id: &str, text: &str, lang: Option<&str>) -> KnowledgeChunk {
        KnowledgeChunk {
            id: id.into(),
            text: text.into(),
            source: "faq.jsonl".into(),
            metadata: match lang {
                Some(l) => json!({"lang": l}),
                None => json!({}),
            },
        }
    }

    fn retriever() -> (KbRetriever, Arc<MockEmbedder>) {
        let embedder = Arc::new(MockEmbedder::new(256));
        let cache = EmbeddingCache::new(Arc::new(MemoryStorage::new()), embedder.clone(), 8);
        (KbRetriever::new(Arc::new(cache), IndexBackend::Normalized, 6, 60), embedder)
    }

    #[tokio::test]
    async fn empty_index_returns_empty_without_embedding() {
        let (kb, embedder) = retriever();
        assert!(kb.retrieve("moq", "en", 3).await.unwrap().is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn filters_to_locale_and_untagged() {
        let (kb, _) = retriever();
        kb.rebuild(vec![
            chunk("moq", "minimum order quantity is 300 pieces", Some("en")),
            chunk("moq-zh", "minimum order quantity 最小起订量 300", Some("zh")),
            chunk("ship", "minimum shipping by sea", None),
        ])
        .await
        .unwrap();

        let hits = kb.retrieve("minimum order quantity", "en", 5).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids[0], "moq");
        assert!(ids.contains(&"ship"));
        assert!(!ids.contains(&"moq-zh"));
    }

    #[tokio::test]
    async fn duplicate_ids_keep_best_score() {
        let (kb, _) = retriever();
        kb.rebuild(vec![
            chunk("lead", "sample lead time is seven days", None),
            chunk("lead", "lead time", None),
            chunk("other", "unrelated warranty text", None),
        ])
        .await
        .unwrap();

        let hits = kb.retrieve("sample lead time seven days", "en", 3).await.unwrap();
        let lead: Vec<_> = hits.iter().filter(|h| h.chunk.id == "lead").collect();
        assert_eq!(lead.len(), 1);
        assert_eq!(lead[0].chunk.text, "sample lead time is seven days");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn returns_at_most_k() {
        let (kb, _) = retriever();
        let chunks = (0..10)
            .map(|i| chunk(&format!("c{i}"), &format!("shipping note {i}"), None))
            .collect();
        kb.rebuild(chunks).await.unwrap();
        assert_eq!(kb.retrieve("shipping", "en", 2).await.unwrap().len(), 2);
        assert!(kb.retrieve("shipping", "en", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn identical_texts_embedded_once() {
        let (kb, embedder) = retriever();
        kb.rebuild(vec![chunk("a", "same text", None), chunk("b", "same text", None)])
            .await
            .unwrap();
        assert_eq!(embedder.embedded_texts().await, vec!["same text".to_string()]);

        let report = kb.reindex().await.unwrap();
        assert_eq!(report.cache.hits, 2);
    }

    #[test]
    fn render_hits_joins_texts() {
        let hits = vec![
            ScoredChunk { chunk: chunk("a", "one", None), score: 0.9 },
            ScoredChunk { chunk: chunk("b", "two", None), score: 0.5 },
        ];
        assert_eq!(render_hits(&hits), "one\n---\ntwo");
    }
}
