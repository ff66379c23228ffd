// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid product ranking for the `product_search` tool.
//!
//! Every catalog item gets a lexical score (keywords found in its fields,
//! plus a bonus for keywords in its name) and an exact-mention boost. Items
//! found by semantic search add `alpha * similarity * 100`. Semantic-only
//! hits must clear a floor so weak associations stay out of the results.

use std::collections::HashMap;

use serde_json::Value;

use crate::catalog::CatalogItem;

const ID_BOOST: u32 = 50;
const SLUG_BOOST: u32 = 40;
const NAME_BOOST: u32 = 35;
/// Names shorter than this never earn the name boost.
const NAME_BOOST_MIN_CHARS: usize = 8;

/// Scoring knobs, normally taken from `[retrieval]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub alpha: f64,
    pub semantic_floor: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            alpha: 0.35,
            semantic_floor: 20.0,
        }
    }
}

/// One ranked search result with its score breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridHit {
    pub item: CatalogItem,
    /// `lex_score + exact_boost + alpha * semantic_score * 100`.
    pub score: f64,
    pub lex_score: u32,
    pub exact_boost: u32,
    /// Cosine similarity from the vector index; 0 when not a semantic hit.
    pub semantic_score: f32,
}

impl HybridHit {
    fn is_lexical(&self) -> bool {
        self.lex_score > 0 || self.exact_boost > 0
    }
}

/// Lowercased runs of ASCII letters, digits and CJK ideographs.
pub fn keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || is_cjk(c)))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn squash(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Flatten a catalog attribute for keyword matching.
///
/// Locale maps pick `locale`, then `en`, then `zh`. Other maps become
/// `key: value` pairs so specification names are searchable too.
fn searchable(value: &Value, locale: &str) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| searchable(v, locale))
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) if [locale, "en", "zh"].iter().any(|k| map.contains_key(*k)) => {
            [locale, "en", "zh"]
                .iter()
                .filter_map(|k| map.get(*k))
                .map(|v| searchable(v, locale))
                .find(|s| !s.is_empty())
                .unwrap_or_default()
        }
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", searchable(v, locale)))
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Keyword hits over id, slug, name, description, category, tags,
/// materials and specifications, plus one more per keyword in the name.
pub fn lexical_score(item: &CatalogItem, keywords: &[String], locale: &str) -> u32 {
    let name = searchable(&item.name, locale).to_lowercase();
    let haystack = [
        item.id.clone(),
        item.slug.clone(),
        name.clone(),
        searchable(&item.description, locale),
        item.category.clone(),
        item.tags.join(" "),
        searchable(&item.materials, locale),
        searchable(&item.specifications, locale),
    ]
    .join(" ")
    .to_lowercase();

    let count = |text: &str| keywords.iter().filter(|kw| text.contains(kw.as_str())).count();
    (count(&haystack) + count(&name)) as u32
}

/// Boost for a query that names the item by id, slug or a long enough name.
pub fn exact_boost(item: &CatalogItem, query: &str, locale: &str) -> u32 {
    let query = squash(query);
    let mentions = |key: &str| !key.is_empty() && query.contains(key);

    let mut boost = 0;
    if mentions(&squash(&item.id)) {
        boost += ID_BOOST;
    }
    if mentions(&squash(&item.slug)) {
        boost += SLUG_BOOST;
    }
    let name = squash(&searchable(&item.name, locale));
    if name.chars().count() >= NAME_BOOST_MIN_CHARS && mentions(&name) {
        boost += NAME_BOOST;
    }
    boost
}

/// The key semantic hits are reported under.
pub(crate) fn item_key(item: &CatalogItem) -> &str {
    if item.id.is_empty() { &item.slug } else { &item.id }
}

/// Rank `items` for `query`, merging precomputed semantic similarities
/// (keyed by [`item_key`]).
///
/// The top `limit` by hybrid score are taken first, then semantic-only hits
/// at or below the floor are dropped, so fewer than `limit` may remain.
pub fn rank(
    items: &[CatalogItem],
    query: &str,
    locale: &str,
    semantic: &HashMap<String, f32>,
    limit: usize,
    weights: HybridWeights,
) -> Vec<HybridHit> {
    if query.trim().is_empty() || limit == 0 {
        return Vec::new();
    }
    let keywords = keywords(query);
    let weigh = |similarity: f32| weights.alpha * f64::from(similarity) * 100.0;

    let mut hits: Vec<HybridHit> = items
        .iter()
        .filter_map(|item| {
            let lex_score = if keywords.is_empty() {
                0
            } else {
                lexical_score(item, &keywords, locale)
            };
            let exact_boost = exact_boost(item, query, locale);
            let semantic_score = semantic.get(item_key(item)).copied();
            if lex_score + exact_boost == 0 && semantic_score.is_none() {
                return None;
            }
            let semantic_score = semantic_score.unwrap_or(0.0);
            Some(HybridHit {
                item: item.clone(),
                score: f64::from(lex_score + exact_boost) + weigh(semantic_score),
                lex_score,
                exact_boost,
                semantic_score,
            })
        })
        .collect();

    // Lexical candidates first so ties keep keyword matches ahead.
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.is_lexical().cmp(&a.is_lexical()))
    });
    hits.truncate(limit);
    hits.retain(|hit| hit.is_lexical() || hit.score > weights.semantic_floor);
    hits
}
