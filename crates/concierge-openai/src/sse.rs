// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE frame parser for streaming Chat Completions.
//!
//! OpenAI-compatible servers send unnamed `data:` events, each carrying one
//! JSON chunk, and terminate with the literal `data: [DONE]`.

use std::pin::Pin;

use concierge_core::ConciergeError;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};

use crate::types::ChatCompletionChunk;

const DONE_SENTINEL: &str = "[DONE]";

/// Typed frames of a streaming completion.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Chunk(ChatCompletionChunk),
    /// The server sent `[DONE]`.
    Done,
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ConciergeError>> + Send>>;

/// Parses a streaming HTTP response into [`StreamEvent`]s.
///
/// Empty keep-alive frames are skipped. A frame that is not valid chunk JSON
/// becomes an error item; the caller decides whether to stop.
pub fn parse_sse_stream(response: reqwest::Response) -> EventStream {
    let mapped = response
        .bytes_stream()
        .eventsource()
        .filter_map(|result| async move {
            match result {
                Ok(event) => parse_frame(&event.data),
                Err(e) => Some(Err(ConciergeError::provider(format!(
                    "SSE stream error: {e}"
                )))),
            }
        });

    Box::pin(mapped)
}

fn parse_frame(data: &str) -> Option<Result<StreamEvent, ConciergeError>> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    if data == DONE_SENTINEL {
        return Some(Ok(StreamEvent::Done));
    }
    Some(
        serde_json::from_str::<ChatCompletionChunk>(data)
            .map(StreamEvent::Chunk)
            .map_err(|e| ConciergeError::Provider {
                message: format!("failed to parse stream chunk: {e}"),
                source: Some(Box::new(e)),
            }),
    )
}
