// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `[Context]` block appended to the system prompt.

use concierge_retrieval::normalize::tail_chars;
use concierge_state::{Slots, slot};
use serde_json::{Map, Value};

pub const CONTEXT_HEADER: &str = "[Context]";
pub const POLICY_HEADER: &str = "[Tool Policies]";

fn is_zh(locale: &str) -> bool {
    locale.trim().to_lowercase().starts_with("zh")
}

struct Titles {
    summary: &'static str,
    slots: &'static str,
    kb: &'static str,
}

fn titles(locale: &str) -> Titles {
    if is_zh(locale) {
        Titles {
            summary: "对话摘要(压缩)",
            slots: "对话关键信息(自动提取)",
            kb: "公司知识库:",
        }
    } else {
        Titles {
            summary: "Conversation Summary (compressed)",
            slots: "Conversation Slots (auto-extracted)",
            kb: "Knowledge Base:",
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Slots worth repeating to the model: the allow-list plus the
/// confirmation slot, leaving out null, empty and false values.
pub fn compact_slots(slots: &Slots, confirmation_slot: &str) -> Map<String, Value> {
    [slot::NAME, slot::EMAIL, slot::QUANTITY, slot::PRODUCT_ID, confirmation_slot]
        .into_iter()
        .filter_map(|key| {
            slots
                .get(key)
                .filter(|v| !is_blank(v))
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect()
}

/// Inputs of the context block. Empty parts are left out.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextParts<'a> {
    pub summary: &'a str,
    pub slots: Option<&'a Slots>,
    pub kb_context: &'a str,
    pub product_context: &'a str,
}

/// Render the sections of the context block, without the header.
///
/// The summary keeps its last `summary_max_chars` characters.
pub fn render_context(
    parts: &ContextParts<'_>,
    locale: &str,
    confirmation_slot: &str,
    summary_max_chars: usize,
) -> String {
    let titles = titles(locale);
    let mut sections: Vec<String> = Vec::new();

    let summary = tail_chars(parts.summary.trim(), summary_max_chars).trim();
    if !summary.is_empty() {
        sections.push(format!("{}:\n{summary}", titles.summary));
    }

    if let Some(slots) = parts.slots {
        let kept = compact_slots(slots, confirmation_slot);
        if !kept.is_empty() {
            sections.push(format!("{}:\n{}", titles.slots, Value::Object(kept)));
        }
    }

    let kb = parts.kb_context.trim();
    if !kb.is_empty() {
        sections.push(format!("{}\n{kb}", titles.kb));
    }

    let product = parts.product_context.trim();
    if !product.is_empty() {
        sections.push(product.to_string());
    }

    sections.join("\n\n")
}

/// Join non-empty policy texts under the policy header.
pub fn render_policies<S: AsRef<str>>(policies: &[S]) -> String {
    let kept: Vec<&str> = policies
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect();
    if kept.is_empty() {
        return String::new();
    }
    format!("{POLICY_HEADER}\n{}", kept.join("\n\n"))
}
