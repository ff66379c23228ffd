// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM completion backends.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::ConciergeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse, ProviderStreamChunk};

/// A boxed stream of normalized provider chunks.
pub type ProviderStream =
    Pin<Box<dyn Stream<Item = Result<ProviderStreamChunk, ConciergeError>> + Send>>;

/// Adapter for LLM completion backends.
///
/// Implementations normalize their wire protocol so that callers only ever
/// see text deltas, at most one assembled tool call, errors, and a final
/// `Done` chunk.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest)
        -> Result<ProviderResponse, ConciergeError>;

    /// Sends a completion request and returns a stream of normalized chunks.
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, ConciergeError>;
}
