// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain data passed across the collaborator traits.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Result of [`PluginAdapter::health_check`](crate::PluginAdapter::health_check).
/// The strings say what is wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

/// Identifies the kind of external collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    /// Chat completion backend.
    Provider,
    /// Text embedding backend.
    Embedding,
    /// Inquiry and embedding-cache persistence.
    Storage,
    /// Inquiry delivery.
    Notifier,
}

/// One turn of a chat transcript as supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `user`, `assistant`, or `system` for engine notes kept in history.
    pub role: String,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            text: text.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

// --- Provider types ---

/// Chat message in provider-neutral form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// One of `system`, `user`, `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// One chat-completion call, streaming or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Model identifier sent to the provider.
    pub model: String,
    /// System prompt first, then history and the current user turn.
    pub messages: Vec<ProviderMessage>,
    /// Flat tool descriptors (`{type, name, description, parameters}`).
    /// `None` or empty disables tool calling for the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
    /// Completion token cap; provider default when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature; provider default when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Ask for server-sent deltas instead of one response.
    #[serde(default)]
    pub stream: bool,
}

/// A tool invocation requested by the model, with arguments already parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, when the provider sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tool name as advertised in the request.
    pub name: String,
    /// Parsed JSON arguments; an empty object when the model sent none.
    pub arguments: serde_json::Value,
}

/// Prompt and completion token counts, zero when the provider omits them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u32,
    /// Completion tokens.
    pub output_tokens: u32,
}

/// The assembled answer of a non-streaming call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Provider response id.
    pub id: String,
    /// Assistant text; empty when the model only called a tool.
    pub content: String,
    /// Model that actually answered.
    pub model: String,
    /// The first tool call in the response, if any.
    pub tool_call: Option<ToolCall>,
    /// Provider finish reason, e.g. `stop` or `tool_calls`.
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

/// Normalized event kinds produced by every streaming provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum StreamEventType {
    /// Incremental assistant text.
    Delta,
    /// A fully assembled tool call.
    ToolCall,
    /// Provider-side failure mid-stream.
    Error,
    /// End of the model turn.
    Done,
}

/// One normalized streaming event. Which optional field is set follows
/// `event_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStreamChunk {
    pub event_type: StreamEventType,
    /// Set for `Delta`.
    pub text: Option<String>,
    /// Set for `ToolCall`.
    pub tool_call: Option<ToolCall>,
    /// Set for `Error`.
    pub error: Option<String>,
    /// May be set for `Done` when the provider reports usage.
    pub usage: Option<TokenUsage>,
}

impl ProviderStreamChunk {
    fn of(event_type: StreamEventType) -> Self {
        ProviderStreamChunk {
            event_type,
            text: None,
            tool_call: None,
            error: None,
            usage: None,
        }
    }

    pub fn delta(text: impl Into<String>) -> Self {
        ProviderStreamChunk {
            text: Some(text.into()),
            ..Self::of(StreamEventType::Delta)
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        ProviderStreamChunk {
            tool_call: Some(call),
            ..Self::of(StreamEventType::ToolCall)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProviderStreamChunk {
            error: Some(message.into()),
            ..Self::of(StreamEventType::Error)
        }
    }

    pub fn done(usage: Option<TokenUsage>) -> Self {
        ProviderStreamChunk {
            usage,
            ..Self::of(StreamEventType::Done)
        }
    }
}

// --- Embedding types ---

/// Input for an embedding adapter.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingInput {
    /// Texts to embed, in order.
    pub texts: Vec<String>,
}

/// Output from an embedding adapter. `embeddings[i]` belongs to `texts[i]`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    /// Length of every vector in `embeddings`.
    pub dimensions: usize,
}

// --- Storage types ---

/// Delivery status of a persisted inquiry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InquiryStatus {
    /// Stored, delivery not attempted or not finished.
    Pending,
    /// Delivered; `delivery_id` is set.
    Sent,
    /// Delivery failed; `error` is set.
    Failed,
}

/// A customer inquiry about to be persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewInquiry {
    /// Customer name.
    pub name: String,
    /// Customer reply-to address.
    pub email: String,
    /// Inquiry body, including the appended product context.
    pub message: String,
    /// Catalog id of the product asked about.
    pub product_id: Option<String>,
    /// Catalog slug of the product asked about.
    pub product_slug: Option<String>,
    /// Where the inquiry came from, e.g. `chat_tool`.
    pub source: String,
    /// Free-form context such as the conversation locale.
    pub meta: Option<serde_json::Value>,
}

/// A persisted inquiry row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InquiryRecord {
    /// UUID assigned on insert.
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub product_id: Option<String>,
    pub product_slug: Option<String>,
    pub source: String,
    pub status: InquiryStatus,
    /// Notifier message id once sent.
    pub delivery_id: Option<String>,
    /// Last delivery error once failed.
    pub error: Option<String>,
    /// RFC 3339 UTC with milliseconds.
    pub created_at: String,
    /// RFC 3339 UTC with milliseconds; changes with `status`.
    pub updated_at: String,
}

/// Which embedding cache namespace an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CacheNamespace {
    /// Keyed by catalog item id; the content hash is stored alongside.
    Product,
    /// Keyed by the content hash itself.
    Knowledge,
}

/// A cached embedding vector and the content hash it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEmbedding {
    /// SHA-256 hex of the embedded text.
    pub content_hash: String,
    pub vector: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn inquiry_status_round_trips_through_strings() {
        for status in [InquiryStatus::Pending, InquiryStatus::Sent, InquiryStatus::Failed] {
            let s = status.to_string();
            assert_eq!(InquiryStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(InquiryStatus::Pending.to_string(), "pending");
    }

    #[test]
    fn stream_chunk_constructors_set_event_type() {
        assert_eq!(ProviderStreamChunk::delta("hi").event_type, StreamEventType::Delta);
        assert_eq!(ProviderStreamChunk::done(None).event_type, StreamEventType::Done);
        let call = ToolCall {
            id: None,
            name: "product_search".into(),
            arguments: serde_json::json!({"query": "bag"}),
        };
        let chunk = ProviderStreamChunk::tool_call(call.clone());
        assert_eq!(chunk.tool_call, Some(call));
    }

    #[test]
    fn chat_turn_role_helpers() {
        assert!(ChatTurn::user("hi").is_user());
        assert!(!ChatTurn::assistant("hello").is_user());
    }
}
