// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalization of streamed completion frames into provider chunks.
//!
//! Text deltas pass through as they arrive. Tool-call fragments are held
//! back and assembled per index; when the turn ends the first named call is
//! emitted, followed by a single `Done` carrying usage.

use std::collections::{BTreeMap, VecDeque};

use concierge_core::{ConciergeError, ProviderStream, ProviderStreamChunk, TokenUsage, ToolCall};
use futures::stream::{self, StreamExt};
use serde_json::{Value, json};
use tracing::debug;

use crate::sse::{EventStream, StreamEvent};
use crate::types::ChatCompletionChunk;

/// Parses model-produced argument JSON without failing the turn.
///
/// Blank input becomes `{}`; invalid JSON is kept under `_raw` so schema
/// validation can report it back to the model.
pub fn parse_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return json!({});
    }
    serde_json::from_str(trimmed).unwrap_or_else(|e| {
        debug!(error = %e, "tool arguments are not valid JSON");
        json!({"_raw": raw})
    })
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

#[derive(Debug, Default)]
struct Normalizer {
    calls: BTreeMap<usize, PartialCall>,
    usage: Option<TokenUsage>,
    finished: bool,
}

impl Normalizer {
    fn on_event(&mut self, event: StreamEvent) -> Vec<ProviderStreamChunk> {
        match event {
            StreamEvent::Chunk(chunk) => self.on_chunk(chunk),
            StreamEvent::Done => self.finish(),
        }
    }

    fn on_chunk(&mut self, chunk: ChatCompletionChunk) -> Vec<ProviderStreamChunk> {
        if let Some(error) = chunk.error {
            self.finished = true;
            return vec![ProviderStreamChunk::error(error.to_string())];
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            });
        }

        let mut out = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content
                && !text.is_empty()
            {
                out.push(ProviderStreamChunk::delta(text));
            }
            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                let partial = self.calls.entry(fragment.index).or_default();
                if let Some(id) = fragment.id {
                    partial.id = Some(id);
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        partial.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial.arguments.push_str(&arguments);
                    }
                }
            }
        }
        out
    }

    /// Closes the turn. Idempotent: only the first call produces chunks.
    fn finish(&mut self) -> Vec<ProviderStreamChunk> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut out = Vec::with_capacity(2);
        let mut named = std::mem::take(&mut self.calls)
            .into_values()
            .filter(|call| !call.name.is_empty());
        if let Some(first) = named.next() {
            let extra = named.count();
            if extra > 0 {
                debug!(kept = %first.name, extra, "additional streamed tool calls dropped");
            }
            out.push(ProviderStreamChunk::tool_call(ToolCall {
                id: first.id,
                arguments: parse_arguments(&first.arguments),
                name: first.name,
            }));
        }
        out.push(ProviderStreamChunk::done(self.usage));
        out
    }
}

/// Turns parsed SSE frames into the normalized [`ProviderStream`].
///
/// A transport or parse error is yielded once and ends the stream. A stream
/// that closes without `[DONE]` still flushes its pending tool call and
/// `Done`.
pub fn normalize(events: EventStream) -> ProviderStream {
    let queue: VecDeque<Result<ProviderStreamChunk, ConciergeError>> = VecDeque::new();
    let state = (events, Normalizer::default(), queue);
    let chunks = stream::unfold(state, |(mut events, mut norm, mut queue)| async move {
        loop {
            if let Some(item) = queue.pop_front() {
                return Some((item, (events, norm, queue)));
            }
            if norm.finished {
                return None;
            }
            match events.next().await {
                Some(Ok(event)) => queue.extend(norm.on_event(event).into_iter().map(Ok)),
                Some(Err(e)) => {
                    norm.finished = true;
                    queue.push_back(Err(e));
                }
                None => queue.extend(norm.finish().into_iter().map(Ok)),
            }
        }
    });
    Box::pin(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiErrorDetail, ChunkChoice, ChunkDelta, FunctionDelta, ToolCallDelta};
    use concierge_core::StreamEventType;

    fn text_chunk(text: &str) -> StreamEvent {
        StreamEvent::Chunk(ChatCompletionChunk {
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    content: Some(text.into()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
            ..Default::default()
        })
    }

    fn tool_fragment(index: usize, name: Option<&str>, args: &str) -> StreamEvent {
        StreamEvent::Chunk(ChatCompletionChunk {
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    content: None,
                    tool_calls: Some(vec![ToolCallDelta {
                        index,
                        id: name.map(|n| format!("call_{n}")),
                        function: Some(FunctionDelta {
                            name: name.map(str::to_string),
                            arguments: Some(args.into()),
                        }),
                    }]),
                },
                finish_reason: None,
            }],
            ..Default::default()
        })
    }

    async fn run(events: Vec<Result<StreamEvent, ConciergeError>>) -> Vec<Result<ProviderStreamChunk, ConciergeError>> {
        normalize(Box::pin(stream::iter(events))).collect().await
    }

    fn kinds(chunks: &[Result<ProviderStreamChunk, ConciergeError>]) -> Vec<Option<StreamEventType>> {
        chunks
            .iter()
            .map(|c| c.as_ref().ok().map(|c| c.event_type))
            .collect()
    }

    #[test]
    fn parse_arguments_is_lenient() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("  "), json!({}));
        assert_eq!(parse_arguments("{\"q\":1}"), json!({"q": 1}));
        assert_eq!(parse_arguments("{\"q\":"), json!({"_raw": "{\"q\":"}));
    }

    #[tokio::test]
    async fn text_only_turn() {
        let chunks = run(vec![Ok(text_chunk("Hi")), Ok(text_chunk("")), Ok(StreamEvent::Done)]).await;
        assert_eq!(
            kinds(&chunks),
            vec![Some(StreamEventType::Delta), Some(StreamEventType::Done)]
        );
    }

    #[tokio::test]
    async fn first_named_call_wins() {
        let chunks = run(vec![
            Ok(tool_fragment(1, Some("send_inquiry"), "{}")),
            Ok(tool_fragment(0, Some("product_search"), "{\"query\":")),
            Ok(tool_fragment(0, None, "\"lamp\"}")),
            Ok(tool_fragment(2, None, "{}")),
            Ok(StreamEvent::Done),
        ])
        .await;

        assert_eq!(chunks.len(), 2);
        let call = chunks[0].as_ref().unwrap().tool_call.clone().unwrap();
        assert_eq!(call.name, "product_search");
        assert_eq!(call.id.as_deref(), Some("call_product_search"));
        assert_eq!(call.arguments, json!({"query": "lamp"}));
    }

    #[tokio::test]
    async fn missing_done_still_flushes() {
        let chunks = run(vec![Ok(tool_fragment(0, Some("product_search"), ""))]).await;
        assert_eq!(
            kinds(&chunks),
            vec![Some(StreamEventType::ToolCall), Some(StreamEventType::Done)]
        );
        let call = chunks[0].as_ref().unwrap().tool_call.clone().unwrap();
        assert_eq!(call.arguments, json!({}));
    }

    #[tokio::test]
    async fn in_band_error_ends_the_stream() {
        let chunks = run(vec![
            Ok(text_chunk("par")),
            Ok(StreamEvent::Chunk(ChatCompletionChunk {
                error: Some(ApiErrorDetail {
                    message: "overloaded".into(),
                    type_: None,
                }),
                ..Default::default()
            })),
            Ok(text_chunk("never")),
        ])
        .await;

        assert_eq!(
            kinds(&chunks),
            vec![Some(StreamEventType::Delta), Some(StreamEventType::Error)]
        );
        assert_eq!(chunks[1].as_ref().unwrap().error.as_deref(), Some("overloaded"));
    }

    #[tokio::test]
    async fn transport_error_is_yielded_once() {
        let chunks = run(vec![
            Ok(text_chunk("a")),
            Err(ConciergeError::provider("connection reset")),
            Ok(StreamEvent::Done),
        ])
        .await;
        assert_eq!(kinds(&chunks), vec![Some(StreamEventType::Delta), None]);
    }
}
