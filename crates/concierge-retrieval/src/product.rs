// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Product retrieval: exact identifier/name matching first, then semantic search.

use std::collections::HashMap;
use std::sync::Arc;

use concierge_config::model::IndexBackend;
use concierge_core::ConciergeError;
use concierge_index::{ActiveIndex, CacheStats, Document, EmbeddingCache, IndexSnapshot, build_index};
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

use crate::catalog::CatalogItem;
use crate::context::render_products;
use crate::hybrid::{self, HybridHit, HybridWeights};
use crate::normalize::normalize;

/// Shortest ASCII query allowed to match as a fragment of a product name.
const MIN_ASCII_FRAGMENT: usize = 4;
/// Shortest non-ASCII (CJK) query allowed to match as a name fragment.
const MIN_WIDE_FRAGMENT: usize = 2;

/// How the product context for a turn was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// The query named a product by id, slug or name.
    Exact,
    /// Semantic top-k.
    Rag,
    /// The conversation's focus product was kept in place of a search.
    ContextLock,
    /// No product retrieval for this turn.
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item: CatalogItem,
    /// Similarity score; `None` for exact and focus hits.
    pub score: Option<f32>,
}

/// The outcome of a product retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductHits {
    pub mode: RetrievalMode,
    pub items: Vec<ScoredItem>,
}

impl ProductHits {
    fn single(mode: RetrievalMode, item: CatalogItem) -> Self {
        Self {
            mode,
            items: vec![ScoredItem { item, score: None }],
        }
    }

    pub fn skipped() -> Self {
        Self {
            mode: RetrievalMode::Skipped,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item a pin should follow after this retrieval, if any.
    pub fn focus(&self) -> Option<&CatalogItem> {
        match self.mode {
            RetrievalMode::Exact | RetrievalMode::ContextLock => {
                self.items.first().map(|s| &s.item)
            }
            _ => None,
        }
    }

    /// Render as a prompt context block.
    pub fn render(&self, locale: &str, desc_max_len: usize) -> String {
        render_products(
            self.items.iter().map(|s| &s.item),
            self.mode,
            locale,
            desc_max_len,
        )
    }
}

/// Counters from an index rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub items: usize,
    pub cache: CacheStats,
}

pub struct ProductRetriever {
    active: ActiveIndex<CatalogItem>,
    cache: Arc<EmbeddingCache>,
    backend: IndexBackend,
    fuzzy_threshold: f64,
    hybrid: HybridWeights,
}

impl ProductRetriever {
    pub fn new(cache: Arc<EmbeddingCache>, backend: IndexBackend, fuzzy_threshold: f64) -> Self {
        Self {
            active: ActiveIndex::new(),
            cache,
            backend,
            fuzzy_threshold,
            hybrid: HybridWeights::default(),
        }
    }

    pub fn with_hybrid(mut self, weights: HybridWeights) -> Self {
        self.hybrid = weights;
        self
    }

    /// Replace the catalog without embedding it; exact matching works immediately.
    pub fn set_items(&self, items: Vec<CatalogItem>) {
        self.active.swap(IndexSnapshot::unindexed(items));
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot<CatalogItem>> {
        self.active.load()
    }

    pub fn len(&self) -> usize {
        self.active.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embed `items` (through the cache) and swap in a new index over them.
    pub async fn rebuild(&self, items: Vec<CatalogItem>) -> Result<RebuildReport, ConciergeError> {
        if items.is_empty() {
            self.active.swap(IndexSnapshot::empty());
            return Ok(RebuildReport::default());
        }
        let docs: Vec<Document> = items
            .iter()
            .map(|item| Document {
                key: if item.id.is_empty() { item.slug.clone() } else { item.id.clone() },
                text: item.doc_text(),
            })
            .collect();
        let (vectors, stats) = self.cache.embed_products(&docs).await?;
        let index = build_index(self.backend, vectors)?;
        let count = items.len();
        self.active.swap(IndexSnapshot::new(items, index)?);
        info!(
            items = count,
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            "product index rebuilt"
        );
        Ok(RebuildReport {
            items: count,
            cache: stats,
        })
    }

    /// Re-embed the current catalog.
    pub async fn reindex(&self) -> Result<RebuildReport, ConciergeError> {
        let items = self.active.load().items().to_vec();
        self.rebuild(items).await
    }

    /// Look an item up by id or slug (normalized comparison).
    pub fn get(&self, key: &str) -> Option<CatalogItem> {
        let key = normalize(key);
        if key.is_empty() {
            return None;
        }
        let snapshot = self.active.load();
        let found = snapshot
            .items()
            .iter()
            .find(|item| normalize(&item.id) == key)
            .or_else(|| snapshot.items().iter().find(|item| normalize(&item.slug) == key));
        found.cloned()
    }

    /// Match the query against identifiers, then names, then fuzzily.
    pub fn exact_match(&self, query: &str, locale: &str) -> Option<CatalogItem> {
        let qn = normalize(query);
        if qn.is_empty() {
            return None;
        }
        let snapshot = self.active.load();
        let items = snapshot.items();

        let by_identifier = items.iter().find(|item| {
            [&item.id, &item.slug].iter().any(|key| {
                let key = normalize(key);
                !key.is_empty() && qn.contains(&key)
            })
        });
        if let Some(item) = by_identifier {
            debug!(id = %item.id, "exact match on identifier");
            return Some(item.clone());
        }

        let fragment_ok = if qn.is_ascii() {
            qn.chars().count() >= MIN_ASCII_FRAGMENT
        } else {
            qn.chars().count() >= MIN_WIDE_FRAGMENT
        };
        let by_name = items.iter().find(|item| {
            name_candidates(item, locale)
                .iter()
                .any(|name| qn.contains(name.as_str()) || (fragment_ok && name.contains(&qn)))
        });
        if let Some(item) = by_name {
            debug!(id = %item.id, "exact match on name");
            return Some(item.clone());
        }

        let mut best: Option<(&CatalogItem, f64)> = None;
        for item in items {
            let mut candidates = name_candidates(item, locale);
            let slug = normalize(&item.slug);
            if !slug.is_empty() {
                candidates.push(slug);
            }
            let score = candidates
                .iter()
                .map(|c| strsim::normalized_levenshtein(&qn, c))
                .fold(0.0_f64, f64::max);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((item, score));
            }
        }
        match best {
            Some((item, score)) if score >= self.fuzzy_threshold => {
                debug!(id = %item.id, score, "exact match on fuzzy name");
                Some(item.clone())
            }
            _ => None,
        }
    }

    /// Semantic top-`k` with scores. Empty for `k == 0` or an unbuilt index.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(CatalogItem, f32)>, ConciergeError> {
        let snapshot = self.active.load();
        if k == 0 || !snapshot.is_indexed() || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.cache.embed_query(query).await?;
        Ok(snapshot
            .search(&vector, k)
            .into_iter()
            .map(|(item, score)| (item.clone(), score))
            .collect())
    }

    /// Keyword, exact-mention and semantic ranking over the whole catalog.
    ///
    /// Semantic candidates are over-fetched so items with a weak keyword
    /// match can still pick up their similarity. An embedding failure
    /// degrades to lexical-only ranking.
    pub async fn hybrid_search(&self, query: &str, locale: &str, limit: usize) -> Vec<HybridHit> {
        let top_k = (limit * 3).max(12);
        let semantic: HashMap<String, f32> = match self.search(query, top_k).await {
            Ok(hits) => hits
                .into_iter()
                .map(|(item, score)| (hybrid::item_key(&item).to_string(), score))
                .collect(),
            Err(e) => {
                warn!(error = %e, "semantic search failed, ranking by keywords only");
                HashMap::new()
            }
        };
        let snapshot = self.active.load();
        hybrid::rank(snapshot.items(), query, locale, &semantic, limit, self.hybrid)
    }

    /// Exact match if any, else semantic top-`k`.
    pub async fn retrieve(
        &self,
        query: &str,
        locale: &str,
        k: usize,
    ) -> Result<ProductHits, ConciergeError> {
        if let Some(item) = self.exact_match(query, locale) {
            return Ok(ProductHits::single(RetrievalMode::Exact, item));
        }
        self.semantic(query, k).await
    }

    /// Retrieval that honors the conversation's focus product.
    ///
    /// An exact match always wins. Otherwise a resolvable focus is kept
    /// (`context_lock`) unless the turn is a broad browse or the plan asked
    /// for no product context at all (`k == 0`).
    pub async fn retrieve_focused(
        &self,
        query: &str,
        locale: &str,
        k: usize,
        focus: Option<&str>,
        broad: bool,
    ) -> Result<ProductHits, ConciergeError> {
        if let Some(item) = self.exact_match(query, locale) {
            return Ok(ProductHits::single(RetrievalMode::Exact, item));
        }
        if k > 0
            && !broad
            && let Some(item) = focus.and_then(|key| self.get(key))
        {
            debug!(id = %item.id, "keeping focus product");
            return Ok(ProductHits::single(RetrievalMode::ContextLock, item));
        }
        self.semantic(query, k).await
    }

    async fn semantic(&self, query: &str, k: usize) -> Result<ProductHits, ConciergeError> {
        if k == 0 {
            return Ok(ProductHits::skipped());
        }
        let hits = self.search(query, k).await?;
        Ok(ProductHits {
            mode: RetrievalMode::Rag,
            items: hits
                .into_iter()
                .map(|(item, score)| ScoredItem {
                    item,
                    score: Some(score),
                })
                .collect(),
        })
    }
}

fn name_candidates(item: &CatalogItem, locale: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(3);
    for name in [item.name(locale), item.name_exact("en"), item.name_exact("zh")] {
        let name = normalize(&name);
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_test_utils::fixtures::{BACKPACK_ID, BACKPACK_SLUG, products_json};
    use concierge_test_utils::{MemoryStorage, MockEmbedder};

    fn catalog() -> Vec<CatalogItem> {
        serde_json::from_value(products_json()).unwrap()
    }

    fn retriever() -> (ProductRetriever, Arc<MockEmbedder>) {
        let embedder = Arc::new(MockEmbedder::new(256));
        let cache = EmbeddingCache::new(Arc::new(MemoryStorage::new()), embedder.clone(), 16);
        let r = ProductRetriever::new(Arc::new(cache), IndexBackend::Exact, 0.84);
        r.set_items(catalog());
        (r, embedder)
    }

    #[test]
    fn identifier_substring_is_exact_regardless_of_case() {
        let (r, _) = retriever();
        let hit = r.exact_match("red JWL-OUTDOOR-018 backpack", "en").unwrap();
        assert_eq!(hit.id, BACKPACK_ID);
        let hit = r.exact_match(&format!("about {BACKPACK_SLUG}?"), "en").unwrap();
        assert_eq!(hit.id, BACKPACK_ID);
    }

    #[test]
    fn name_containment_both_directions() {
        let (r, _) = retriever();
        assert_eq!(
            r.exact_match("do you have the insulated lunch bag in blue", "en")
                .unwrap()
                .id,
            "jwl-lunch-001"
        );
        assert_eq!(r.exact_match("canvas tote", "en").unwrap().id, "jwl-tote-007");
        assert_eq!(r.exact_match("帆布托特", "zh").unwrap().id, "jwl-tote-007");
    }

    #[test]
    fn short_fragments_do_not_match_names() {
        let (r, _) = retriever();
        assert!(r.exact_match("hi", "en").is_none());
        assert!(r.exact_match("bag", "en").is_none());
    }

    #[test]
    fn fuzzy_name_match_above_threshold() {
        let (r, _) = retriever();
        let hit = r.exact_match("insulated lunch bags", "en");
        assert_eq!(hit.unwrap().id, "jwl-lunch-001");
        let hit = r.exact_match("Canvs Tote Bag", "en");
        assert_eq!(hit.unwrap().id, "jwl-tote-007");
        assert!(r.exact_match("waterproof camera case", "en").is_none());
    }

    #[test]
    fn get_by_id_or_slug() {
        let (r, _) = retriever();
        assert_eq!(r.get("JWL-OUTDOOR-018").unwrap().slug, BACKPACK_SLUG);
        assert_eq!(r.get(BACKPACK_SLUG).unwrap().id, BACKPACK_ID);
        assert!(r.get("").is_none());
        assert!(r.get("missing").is_none());
    }

    #[tokio::test]
    async fn exact_match_independent_of_k() {
        let (r, embedder) = retriever();
        let hits = r.retrieve("jwl-outdoor-018", "en", 0).await.unwrap();
        assert_eq!(hits.mode, RetrievalMode::Exact);
        assert_eq!(hits.items.len(), 1);
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn unbuilt_index_returns_empty_rag() {
        let (r, _) = retriever();
        let hits = r.retrieve("something for hiking trips", "en", 3).await.unwrap();
        assert_eq!(hits.mode, RetrievalMode::Rag);
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn semantic_after_rebuild() {
        let (r, _) = retriever();
        let report = r.rebuild(catalog()).await.unwrap();
        assert_eq!(report.items, 3);
        assert_eq!(report.cache.misses, 3);

        let hits = r
            .retrieve("something that keeps food cold for lunch", "en", 2)
            .await
            .unwrap();
        assert_eq!(hits.mode, RetrievalMode::Rag);
        assert_eq!(hits.items.len(), 2);
        assert_eq!(hits.items[0].item.id, "jwl-lunch-001");
        assert!(hits.items[0].score.is_some());
        assert!(hits.render("en", 300).starts_with("[Semantic TopK]"));

        let again = r.reindex().await.unwrap();
        assert_eq!(again.cache.hits, 3);
        assert_eq!(again.cache.misses, 0);
    }

    #[tokio::test]
    async fn k_zero_without_match_is_skipped() {
        let (r, _) = retriever();
        r.rebuild(catalog()).await.unwrap();
        let hits = r.retrieve("hello there", "en", 0).await.unwrap();
        assert_eq!(hits.mode, RetrievalMode::Skipped);
        assert_eq!(hits.mode.to_string(), "none");
        assert!(hits.render("en", 300).is_empty());
    }

    #[tokio::test]
    async fn focus_product_is_kept_unless_broad() {
        let (r, _) = retriever();
        r.rebuild(catalog()).await.unwrap();

        let hits = r
            .retrieve_focused("what is the weight", "en", 3, Some(BACKPACK_ID), false)
            .await
            .unwrap();
        assert_eq!(hits.mode, RetrievalMode::ContextLock);
        assert_eq!(hits.focus().unwrap().id, BACKPACK_ID);
        assert!(hits.render("en", 300).starts_with("[Current Focus Product]\n\n"));

        let broad = r
            .retrieve_focused("recommend something for lunch", "en", 3, Some(BACKPACK_ID), true)
            .await
            .unwrap();
        assert_eq!(broad.mode, RetrievalMode::Rag);
        assert!(broad.focus().is_none());
    }

    #[tokio::test]
    async fn zero_budget_drops_the_focus_product() {
        let (r, embedder) = retriever();
        r.rebuild(catalog()).await.unwrap();
        let before = embedder.calls();
        let hits = r
            .retrieve_focused("yes, send it", "en", 0, Some(BACKPACK_ID), false)
            .await
            .unwrap();
        assert_eq!(hits.mode, RetrievalMode::Skipped);
        assert!(hits.focus().is_none());
        assert!(hits.render("en", 300).is_empty());
        assert_eq!(embedder.calls(), before);

        let exact = r
            .retrieve_focused("and jwl-tote-007?", "en", 0, Some(BACKPACK_ID), false)
            .await
            .unwrap();
        assert_eq!(exact.mode, RetrievalMode::Exact);
    }

    #[tokio::test]
    async fn exact_match_overrides_focus() {
        let (r, _) = retriever();
        let hits = r
            .retrieve_focused("tell me about jwl-tote-007", "en", 3, Some(BACKPACK_ID), false)
            .await
            .unwrap();
        assert_eq!(hits.mode, RetrievalMode::Exact);
        assert_eq!(hits.focus().unwrap().id, "jwl-tote-007");
    }

    #[tokio::test]
    async fn unresolvable_focus_falls_back_to_semantic() {
        let (r, _) = retriever();
        r.rebuild(catalog()).await.unwrap();
        let hits = r
            .retrieve_focused("keeps food cold", "en", 1, Some("gone-item"), false)
            .await
            .unwrap();
        assert_eq!(hits.mode, RetrievalMode::Rag);
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let (r, embedder) = retriever();
        r.rebuild(catalog()).await.unwrap();
        embedder.set_failing(true);
        assert!(r.retrieve("keeps food cold", "en", 2).await.is_err());
    }

    #[tokio::test]
    async fn hybrid_search_puts_named_products_first() {
        let (r, _) = retriever();
        r.rebuild(catalog()).await.unwrap();
        let hits = r.hybrid_search("price for jwl-lunch-001", "en", 3).await;
        assert_eq!(hits[0].item.id, "jwl-lunch-001");
        assert_eq!(hits[0].exact_boost, 50);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

        let hits = r.hybrid_search("canvas", "en", 3).await;
        assert_eq!(hits[0].item.id, "jwl-tote-007");
        assert!(hits.iter().skip(1).all(|h| h.lex_score == 0 && h.score > 20.0));
    }

    #[tokio::test]
    async fn hybrid_search_survives_embedding_failure() {
        let (r, embedder) = retriever();
        r.rebuild(catalog()).await.unwrap();
        embedder.set_failing(true);
        let hits = r.hybrid_search("canvas tote", "en", 5).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item.id, "jwl-tote-007");
        assert_eq!(hits[0].semantic_score, 0.0);
    }

    #[tokio::test]
    async fn empty_rebuild_clears_index() {
        let (r, _) = retriever();
        r.rebuild(Vec::new()).await.unwrap();
        assert!(r.is_empty());
        assert!(r.search("anything", 3).await.unwrap().is_empty());
    }
}
