// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-turn stream consumption as an explicit state machine.
//!
//! The loop feeds every provider chunk through [`LoopState::on_chunk`] and
//! acts on the returned [`Transition`]. When the stream ends,
//! [`LoopState::end_turn`] tells whether the model answered or asked for a
//! tool.

use concierge_core::{ProviderStreamChunk, StreamEventType, TokenUsage, ToolCall};
use tracing::debug;

use crate::events::ChatEvent;

/// What the loop should do with one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Emit(ChatEvent),
    Ignore,
    EndOfTurn,
    Failed(String),
}

/// How a model turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEnd {
    Answer(String),
    Tool { text: String, call: ToolCall },
}

#[derive(Debug)]
pub struct LoopState {
    turn: usize,
    max_turns: usize,
    text: String,
    pending: Option<ToolCall>,
    chunks: usize,
    usage: TokenUsage,
}

impl LoopState {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turn: 0,
            max_turns: max_turns.max(1),
            text: String::new(),
            pending: None,
            chunks: 0,
            usage: TokenUsage::default(),
        }
    }

    /// Start the next model turn, or `false` once the turn budget is spent.
    pub fn begin_turn(&mut self) -> bool {
        if self.exhausted() {
            return false;
        }
        self.turn += 1;
        self.text.clear();
        self.pending = None;
        true
    }

    pub fn turn(&self) -> usize {
        self.turn
    }

    pub fn exhausted(&self) -> bool {
        self.turn >= self.max_turns
    }

    /// Chunks seen across all turns.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Token usage summed over all turns.
    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Partial text of the current turn.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn on_chunk(&mut self, chunk: ProviderStreamChunk) -> Transition {
        self.chunks += 1;
        match chunk.event_type {
            StreamEventType::Delta => match chunk.text {
                Some(text) if !text.is_empty() => {
                    self.text.push_str(&text);
                    Transition::Emit(ChatEvent::Delta { text })
                }
                _ => Transition::Ignore,
            },
            StreamEventType::ToolCall => {
                let Some(call) = chunk.tool_call else {
                    return Transition::Ignore;
                };
                if let Some(first) = &self.pending {
                    debug!(kept = %first.name, ignored = %call.name, "extra tool call ignored");
                    return Transition::Ignore;
                }
                let event = ChatEvent::ToolCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                };
                self.pending = Some(call);
                Transition::Emit(event)
            }
            StreamEventType::Error => Transition::Failed(
                chunk
                    .error
                    .unwrap_or_else(|| "provider stream error".to_string()),
            ),
            StreamEventType::Done => {
                if let Some(usage) = chunk.usage {
                    self.usage.input_tokens += usage.input_tokens;
                    self.usage.output_tokens += usage.output_tokens;
                }
                Transition::EndOfTurn
            }
        }
    }

    /// Close the current turn, taking its text and pending call.
    pub fn end_turn(&mut self) -> TurnEnd {
        let text = std::mem::take(&mut self.text);
        match self.pending.take() {
            Some(call) => TurnEnd::Tool { text, call },
            None => TurnEnd::Answer(text),
        }
    }
}
