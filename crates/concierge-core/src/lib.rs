// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared vocabulary of the Concierge workspace.
//!
//! The engine never names a concrete chat model, embedding service, database
//! or mail server. It talks to them through the traits re-exported here, and
//! tests swap in the mocks from `concierge-test-utils`.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{BoxError, ConciergeError};
pub use types::{
    AdapterType, CacheNamespace, CachedEmbedding, ChatTurn, EmbeddingInput, EmbeddingOutput,
    HealthStatus, InquiryRecord, InquiryStatus, NewInquiry, ProviderMessage, ProviderRequest,
    ProviderResponse, ProviderStreamChunk, StreamEventType, TokenUsage, ToolCall,
};

pub use traits::{
    EmbeddingAdapter, Notifier, PluginAdapter, ProviderAdapter, ProviderStream, StorageAdapter,
};
