// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted chat model. Each request consumes one [`MockTurn`], so a test
//! spells out exactly what the model says and which tools it calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::Mutex;

use concierge_core::{
    AdapterType, ConciergeError, HealthStatus, PluginAdapter, ProviderAdapter, ProviderRequest,
    ProviderResponse, ProviderStream, ProviderStreamChunk, TokenUsage, ToolCall,
};

/// One scripted model turn.
#[derive(Debug, Clone, Default)]
pub struct MockTurn {
    /// Text deltas streamed in order.
    pub deltas: Vec<String>,
    /// Tool call emitted after the deltas.
    pub tool_call: Option<ToolCall>,
    /// Mid-stream provider error emitted instead of `done`.
    pub error: Option<String>,
    /// Fail the request before any chunk is produced.
    pub fail_request: bool,
    /// Pause between chunks.
    pub chunk_delay: Option<Duration>,
}

impl MockTurn {
    /// A turn that answers with plain text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            deltas: vec![text.into()],
            ..Default::default()
        }
    }

    /// A turn that streams the given pieces.
    pub fn deltas<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deltas: pieces.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// A turn that requests a tool call, optionally preceded by text.
    pub fn tool(name: &str, arguments: serde_json::Value) -> Self {
        Self {
            tool_call: Some(ToolCall {
                id: Some(format!("call_{}", uuid::Uuid::new_v4().simple())),
                name: name.to_string(),
                arguments,
            }),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.deltas.insert(0, text.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// A turn whose request fails outright.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            fail_request: true,
            ..Default::default()
        }
    }
}

/// Replays [`MockTurn`]s in order and answers `"mock response"` once they
/// run out. Requests are kept for assertions.
pub struct MockProvider {
    turns: Arc<Mutex<VecDeque<MockTurn>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_turns(Vec::new())
    }

    pub fn with_turns(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(VecDeque::from(turns))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Plain-text turns, one per response.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self::with_turns(responses.into_iter().map(MockTurn::text).collect())
    }

    pub async fn push_turn(&self, turn: MockTurn) {
        self.turns.lock().await.push_back(turn);
    }

    /// All requests received so far.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_turn(&self, request: &ProviderRequest) -> MockTurn {
        self.requests.lock().await.push(request.clone());
        self.turns
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockTurn::text("mock response"))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn refused(turn: MockTurn) -> ConciergeError {
    ConciergeError::provider(turn.error.unwrap_or_else(|| "mock failure".into()))
}

fn mock_usage() -> TokenUsage {
    TokenUsage {
        input_tokens: 10,
        output_tokens: 20,
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ConciergeError> {
        let turn = self.next_turn(&request).await;
        if turn.fail_request {
            return Err(refused(turn));
        }
        Ok(ProviderResponse {
            id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
            content: turn.deltas.concat(),
            model: request.model,
            stop_reason: Some(if turn.tool_call.is_some() {
                "tool_calls".to_string()
            } else {
                "stop".to_string()
            }),
            tool_call: turn.tool_call,
            usage: mock_usage(),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, ConciergeError> {
        let turn = self.next_turn(&request).await;
        if turn.fail_request {
            return Err(refused(turn));
        }

        let mut chunks: Vec<Result<ProviderStreamChunk, ConciergeError>> = turn
            .deltas
            .into_iter()
            .map(|d| Ok(ProviderStreamChunk::delta(d)))
            .collect();
        if let Some(call) = turn.tool_call {
            chunks.push(Ok(ProviderStreamChunk::tool_call(call)));
        }
        match turn.error {
            Some(message) => chunks.push(Ok(ProviderStreamChunk::error(message))),
            None => chunks.push(Ok(ProviderStreamChunk::done(Some(mock_usage())))),
        }

        match turn.chunk_delay {
            None => Ok(Box::pin(stream::iter(chunks))),
            Some(delay) => Ok(Box::pin(stream::unfold(
                chunks.into_iter(),
                move |mut rest| async move {
                    let next = rest.next()?;
                    tokio::time::sleep(delay).await;
                    Some((next, rest))
                },
            ))),
        }
    }
}
