// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request, response and streaming event types of the chat surface.

use concierge_core::ChatTurn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_locale() -> String {
    "en".to_string()
}

/// One chat request from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Ordered turns; the last user turn is the one being answered.
    pub messages: Vec<ChatTurn>,
    /// `en` or `zh`; selects prompts, KB chunks and tool messages.
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Absent for stateless requests.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Gates side-effecting tools for this request.
    #[serde(default)]
    pub allow_actions: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatTurn>) -> Self {
        Self {
            messages,
            locale: default_locale(),
            conversation_id: None,
            allow_actions: false,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn allow_actions(mut self, allow: bool) -> Self {
        self.allow_actions = allow;
        self
    }

    /// The trimmed locale, `en` when blank.
    pub fn locale(&self) -> &str {
        match self.locale.trim() {
            "" => "en",
            locale => locale,
        }
    }

    /// The conversation id, ignoring blank ids.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Non-streaming answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Final assistant text.
    pub response: String,
    /// Tool action the turn performed, e.g. `send_inquiry`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Payload that goes with `action`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_data: Option<Value>,
}

/// Streaming event, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The conversation already knows the customer's name.
    UserUpdate { name: String },
    Delta { text: String },
    ToolCall { name: String, arguments: Value },
    /// A tool result surfaced to the client mid-stream.
    ActionEvent { action: String, action_data: Value },
    Final {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        action_data: Option<Value>,
    },
    Error { message: String },
    Done,
}

impl ChatEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::UserUpdate { .. } => "user_update",
            ChatEvent::Delta { .. } => "delta",
            ChatEvent::ToolCall { .. } => "tool_call",
            ChatEvent::ActionEvent { .. } => "action_event",
            ChatEvent::Final { .. } => "final",
            ChatEvent::Error { .. } => "error",
            ChatEvent::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Error { .. } | ChatEvent::Done)
    }
}
