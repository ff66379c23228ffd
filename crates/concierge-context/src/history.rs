// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation history replay and retrieval query construction.

use concierge_core::{ChatTurn, ProviderMessage};
use concierge_retrieval::normalize::tail_chars;

/// Map a stored role onto a provider role. `bot` is an assistant alias;
/// anything unknown is treated as the user.
pub fn provider_role(role: &str) -> &'static str {
    match role.trim() {
        "assistant" | "bot" => "assistant",
        "system" => "system",
        _ => "user",
    }
}

/// The last `limit` turns as provider messages.
pub fn history_messages(turns: &[ChatTurn], limit: usize) -> Vec<ProviderMessage> {
    let start = turns.len().saturating_sub(limit);
    turns[start..]
        .iter()
        .map(|t| ProviderMessage::new(provider_role(&t.role), t.text.clone()))
        .collect()
}

/// Retrieval query: the last `max_turns` non-empty user texts joined by a
/// space, keeping the tail when longer than `max_chars`.
pub fn rag_query(turns: &[ChatTurn], max_turns: usize, max_chars: usize) -> String {
    let texts: Vec<&str> = turns
        .iter()
        .filter(|t| t.is_user())
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
        .collect();
    let start = texts.len().saturating_sub(max_turns);
    let joined = texts[start..].join(" ");
    tail_chars(joined.trim(), max_chars).trim_start().to_string()
}
