// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly for the Concierge chat engine.
//!
//! The system message is built from three parts, in order:
//! - **Role and policy prompt**: selected per model key and locale
//! - **Context block**: summary, compacted slots, knowledge base and product context
//! - **Tool policies**: the policy text of every tool allowed for the turn
//!
//! The replayed history follows the system message, capped to the most
//! recent turns.

pub mod context;
pub mod history;
pub mod system;

use concierge_config::ConciergeConfig;
use concierge_core::{ChatTurn, ProviderMessage};
use concierge_state::Slots;
use tracing::debug;

pub use context::{CONTEXT_HEADER, ContextParts, POLICY_HEADER, compact_slots, render_context, render_policies};
pub use history::{history_messages, provider_role, rag_query};
pub use system::{DEFAULT_MODEL_KEY, PromptSelector};

/// Everything the assembler needs for one model call.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub model: &'a str,
    pub locale: &'a str,
    pub summary: &'a str,
    pub slots: Option<&'a Slots>,
    pub kb_context: &'a str,
    pub product_context: &'a str,
    /// Policy texts of the allowed tools, already localized.
    pub policies: &'a [String],
    pub turns: &'a [ChatTurn],
}

/// An assembled prompt: the system text and the full message list
/// (system message first).
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub system: String,
    pub messages: Vec<ProviderMessage>,
}

pub struct PromptAssembler {
    selector: PromptSelector,
    history_turns: usize,
    summary_max_chars: usize,
    confirmation_slot: String,
}

impl PromptAssembler {
    pub fn new(
        selector: PromptSelector,
        history_turns: usize,
        summary_max_chars: usize,
        confirmation_slot: impl Into<String>,
    ) -> Self {
        Self {
            selector,
            history_turns,
            summary_max_chars,
            confirmation_slot: confirmation_slot.into(),
        }
    }

    pub fn from_config(config: &ConciergeConfig) -> Self {
        Self::new(
            PromptSelector::from_config(config),
            config.engine.history_turns,
            config.engine.summary_max_chars,
            config.state.confirmation_slot.clone(),
        )
    }

    pub fn selector(&self) -> &PromptSelector {
        &self.selector
    }

    /// The system message text.
    pub fn system_message(&self, input: &PromptInput<'_>) -> String {
        let mut system = self.selector.system_prompt(input.model, input.locale);

        let parts = ContextParts {
            summary: input.summary,
            slots: input.slots,
            kb_context: input.kb_context,
            product_context: input.product_context,
        };
        let context = render_context(&parts, input.locale, &self.confirmation_slot, self.summary_max_chars);
        if !context.is_empty() {
            system.push_str("\n\n");
            system.push_str(CONTEXT_HEADER);
            system.push('\n');
            system.push_str(&context);
        }

        let policies = render_policies(input.policies);
        if !policies.is_empty() {
            system.push_str("\n\n");
            system.push_str(&policies);
        }
        system
    }

    pub fn assemble(&self, input: &PromptInput<'_>) -> AssembledPrompt {
        let system = self.system_message(input);
        let mut messages = Vec::with_capacity(self.history_turns.min(input.turns.len()) + 1);
        messages.push(ProviderMessage::new("system", system.clone()));
        messages.extend(history_messages(input.turns, self.history_turns));
        debug!(
            model_key = %self.selector.model_key(input.model),
            locale = %input.locale,
            system_chars = system.chars().count(),
            messages = messages.len(),
            "prompt assembled"
        );
        AssembledPrompt { system, messages }
    }
}
