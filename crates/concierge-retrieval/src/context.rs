// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering retrieved items into prompt context blocks.

use crate::catalog::{CatalogItem, KnowledgeChunk};
use crate::normalize::truncate_chars;
use crate::product::RetrievalMode;

const MAX_VARIANT_EXAMPLES: usize = 8;
const KB_SEPARATOR: &str = "\n---\n";

fn is_zh(locale: &str) -> bool {
    locale.starts_with("zh")
}

/// Heading and instruction line for a product context block.
fn heading(mode: RetrievalMode, locale: &str) -> (&'static str, &'static str) {
    match (mode, is_zh(locale)) {
        (RetrievalMode::Exact, false) => ("[Product Context]", "Focus on this product."),
        (RetrievalMode::Exact, true) => ("[产品上下文]", "请关注此产品。"),
        (RetrievalMode::ContextLock, false) => ("[Current Focus Product]", ""),
        (RetrievalMode::ContextLock, true) => ("[当前聚焦产品]", ""),
        (_, false) => (
            "[Semantic TopK]",
            "Choose the most relevant product(s) below and cite id/slug.",
        ),
        (_, true) => ("[语义检索 TopK]", "请从下面选择最相关的产品，并引用 id/slug。"),
    }
}

/// One product as a compact multi-line block.
pub fn product_line(item: &CatalogItem, locale: &str, desc_max_len: usize) -> String {
    let mut out = format!(
        "- id={} slug={} name={}\n  category={} tags={}\n  variants_count={}",
        item.id,
        item.slug,
        item.name(locale),
        item.category,
        item.tags.join(","),
        item.variants.len()
    );
    if !item.variants.is_empty() {
        let labels: Vec<String> = item
            .variants
            .iter()
            .take(MAX_VARIANT_EXAMPLES)
            .map(|v| v.label(locale))
            .collect();
        out.push_str(&format!(" examples=[{}]", labels.join(", ")));
        if item.variants.len() > MAX_VARIANT_EXAMPLES {
            out.push_str("...");
        }
    }
    let desc = item.description(locale);
    out.push_str(&format!("\n  desc={}", truncate_chars(&desc, desc_max_len)));
    out
}

/// The product context block for a retrieval result. Empty when no items.
pub fn render_products<'a, I>(
    items: I,
    mode: RetrievalMode,
    locale: &str,
    desc_max_len: usize,
) -> String
where
    I: IntoIterator<Item = &'a CatalogItem>,
{
    let lines: Vec<String> = items
        .into_iter()
        .map(|item| product_line(item, locale, desc_max_len))
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    let (title, hint) = heading(mode, locale);
    let mut out = String::from(title);
    if !hint.is_empty() {
        out.push('\n');
        out.push_str(hint);
    }
    out.push_str("\n\n");
    out.push_str(&lines.join("\n\n"));
    out
}

/// Knowledge chunks joined with a separator line.
pub fn render_chunks<'a, I>(chunks: I) -> String
where
    I: IntoIterator<Item = &'a KnowledgeChunk>,
{
    chunks
        .into_iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(KB_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Variant;
    use serde_json::json;

    fn item(variants: usize) -> CatalogItem {
        CatalogItem {
            id: "p1".into(),
            slug: "bag".into(),
            name: json!({"en": "Bag", "zh": "包"}),
            description: json!({"en": "x".repeat(50)}),
            category: "bags".into(),
            tags: vec!["a".into(), "b".into()],
            variants: (0..variants)
                .map(|i| Variant {
                    key: format!("v{i}"),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn product_line_format() {
        let line = product_line(&item(2), "zh", 10);
        assert_eq!(
            line,
            "- id=p1 slug=bag name=包\n  category=bags tags=a,b\n  variants_count=2 examples=[v0, v1]\n  desc=xxxxxxxxxx"
        );
    }

    #[test]
    fn many_variants_are_elided() {
        let line = product_line(&item(10), "en", 300);
        assert!(line.contains("variants_count=10"));
        assert!(line.contains("v7]..."));
        assert!(!line.contains("v8"));
    }

    #[test]
    fn semantic_block_has_title_and_hint() {
        let a = item(0);
        let block = render_products([&a, &a], RetrievalMode::Rag, "en", 5);
        assert!(block.starts_with(
            "[Semantic TopK]\nChoose the most relevant product(s) below and cite id/slug.\n\n- id=p1"
        ));
        assert_eq!(block.matches("- id=p1").count(), 2);

        let zh = render_products([&a], RetrievalMode::Rag, "zh", 5);
        assert!(zh.starts_with("[语义检索 TopK]\n"));
    }

    #[test]
    fn focus_block_has_no_hint() {
        let a = item(0);
        let block = render_products([&a], RetrievalMode::ContextLock, "en", 5);
        assert!(block.starts_with("[Current Focus Product]\n\n- id=p1"));
    }

    #[test]
    fn empty_items_render_nothing() {
        assert!(render_products(std::iter::empty(), RetrievalMode::Rag, "en", 5).is_empty());
    }

    #[test]
    fn chunks_joined_with_separator() {
        let c = |t: &str| KnowledgeChunk {
            id: t.into(),
            text: t.into(),
            source: "f".into(),
            metadata: json!({}),
        };
        let (a, b) = (c("one"), c("two"));
        assert_eq!(render_chunks([&a, &b]), "one\n---\ntwo");
    }
}
