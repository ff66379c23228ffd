// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bounded model/tool loop.
//!
//! Each model turn either answers (ending the loop) or requests a tool. Tool
//! feedback is appended for the next turn until `max_turns` is reached.
//! Streaming and non-streaming runs share the same driver; a non-streaming
//! response is replayed through the turn state machine as chunks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use concierge_config::ConciergeConfig;
use concierge_core::{
    ChatTurn, ConciergeError, ProviderAdapter, ProviderMessage, ProviderRequest,
    ProviderResponse, ProviderStream, ProviderStreamChunk,
};
use concierge_state::Slots;
use concierge_tools::DispatchContext;
use futures::{StreamExt, stream};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::ChatEvent;
use crate::outcome::{OutcomeProcessor, ToolOutcome};
use crate::turn::{LoopState, Transition, TurnEnd};

/// Role under which tool feedback is recorded in the conversation
/// transcript. The model itself receives feedback as a user message.
pub const FEEDBACK_ROLE: &str = "system";

/// One loop run's inputs.
#[derive(Debug, Clone)]
pub struct LoopInput {
    /// Assembled prompt, system message first.
    pub messages: Vec<ProviderMessage>,
    /// Tool descriptors; empty disables tool calling.
    pub tools: Vec<Value>,
    pub dispatch: DispatchContext,
    pub slots: Option<Slots>,
    pub allow_actions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoopEnd {
    /// The model produced a final answer.
    #[default]
    Answered,
    /// A sensitive tool call was gated and the customer was told why.
    Skipped,
    /// The turn budget ran out while the model kept calling tools.
    Exhausted,
    Failed(String),
    Cancelled,
}

/// What a loop run produced.
#[derive(Debug, Clone, Default)]
pub struct LoopReport {
    /// The reply text of a non-streaming response.
    pub final_text: String,
    pub action: Option<String>,
    pub action_data: Option<Value>,
    pub outcomes: Vec<ToolOutcome>,
    /// Turns to persist: assistant text, tool feedback and gate messages.
    pub transcript: Vec<ChatTurn>,
    pub turns_used: usize,
    pub end: LoopEnd,
}

/// Where events go. Non-streaming runs have no sink.
struct Sink<'a>(Option<&'a mpsc::Sender<ChatEvent>>);

impl Sink<'_> {
    /// Deliver an event; `false` when the receiver is gone.
    async fn emit(&self, event: ChatEvent) -> bool {
        match self.0 {
            Some(tx) => tx.send(event).await.is_ok(),
            None => true,
        }
    }
}

struct Timing {
    started: Instant,
    first_token: Option<Duration>,
}

pub struct AgentLoop {
    provider: Arc<dyn ProviderAdapter>,
    processor: Arc<OutcomeProcessor>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_turns: usize,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        processor: Arc<OutcomeProcessor>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
        max_turns: usize,
    ) -> Self {
        Self {
            provider,
            processor,
            model: model.into(),
            max_tokens,
            temperature,
            max_turns,
        }
    }

    pub fn from_config(
        config: &ConciergeConfig,
        provider: Arc<dyn ProviderAdapter>,
        processor: Arc<OutcomeProcessor>,
    ) -> Self {
        Self::new(
            provider,
            processor,
            config.llm.model.clone(),
            config.llm.max_tokens,
            config.engine.temperature,
            config.engine.max_turns,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    fn request(&self, messages: &[ProviderMessage], tools: &[Value], stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            tools: (!tools.is_empty()).then(|| tools.to_vec()),
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            stream,
        }
    }

    /// Run the loop, pushing events into `tx`.
    ///
    /// Ends with `Done` after a final answer, or with `Error` on provider
    /// failure. A dropped receiver or a cancelled token stops the loop
    /// without further provider calls.
    pub async fn run_stream(
        &self,
        input: LoopInput,
        tx: &mpsc::Sender<ChatEvent>,
        cancel: &CancellationToken,
    ) -> LoopReport {
        self.drive(input, Sink(Some(tx)), cancel, true).await
    }

    /// Run the loop with non-streaming provider calls.
    pub async fn run_complete(&self, input: LoopInput) -> Result<LoopReport, ConciergeError> {
        let report = self
            .drive(input, Sink(None), &CancellationToken::new(), false)
            .await;
        match &report.end {
            LoopEnd::Failed(message) => Err(ConciergeError::provider(message.clone())),
            _ => Ok(report),
        }
    }

    async fn open(&self, request: ProviderRequest, streaming: bool) -> Result<ProviderStream, ConciergeError> {
        if streaming {
            return self.provider.stream(request).await;
        }
        let response = self.provider.complete(request).await?;
        Ok(Box::pin(stream::iter(response_chunks(response).into_iter().map(Ok))))
    }

    async fn drive(
        &self,
        input: LoopInput,
        sink: Sink<'_>,
        cancel: &CancellationToken,
        streaming: bool,
    ) -> LoopReport {
        let LoopInput {
            mut messages,
            tools,
            dispatch,
            slots,
            allow_actions,
        } = input;
        let mut state = LoopState::new(self.max_turns);
        let mut report = LoopReport::default();
        let mut timing = Timing {
            started: Instant::now(),
            first_token: None,
        };
        let mut last_partial = String::new();

        'turns: while state.begin_turn() {
            report.turns_used = state.turn();
            let request = self.request(&messages, &tools, streaming);
            debug!(turn = state.turn(), messages = request.messages.len(), "model turn");

            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.end = LoopEnd::Cancelled;
                    break 'turns;
                }
                opened = self.open(request, streaming) => opened,
            };
            let mut chunks = match opened {
                Ok(chunks) => chunks,
                Err(e) => {
                    self.fail(&mut report, &sink, error_message(&e)).await;
                    break 'turns;
                }
            };

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        report.end = LoopEnd::Cancelled;
                        break 'turns;
                    }
                    next = chunks.next() => next,
                };
                let Some(next) = next else {
                    break;
                };
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        self.fail(&mut report, &sink, error_message(&e)).await;
                        break 'turns;
                    }
                };
                match state.on_chunk(chunk) {
                    Transition::Emit(event) => {
                        if timing.first_token.is_none() && matches!(event, ChatEvent::Delta { .. }) {
                            timing.first_token = Some(timing.started.elapsed());
                        }
                        if !sink.emit(event).await {
                            report.end = LoopEnd::Cancelled;
                            break 'turns;
                        }
                    }
                    Transition::Ignore => {}
                    Transition::EndOfTurn => break,
                    Transition::Failed(message) => {
                        self.fail(&mut report, &sink, message).await;
                        break 'turns;
                    }
                }
            }

            match state.end_turn() {
                TurnEnd::Answer(text) => {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        report.transcript.push(ChatTurn::assistant(text.clone()));
                    }
                    report.final_text = text.clone();
                    report.end = LoopEnd::Answered;
                    self.finish(&mut report, &sink, text).await;
                    break 'turns;
                }
                TurnEnd::Tool { text, call } => {
                    let partial = text.trim().to_string();
                    if !partial.is_empty() {
                        messages.push(ProviderMessage::new("assistant", partial.clone()));
                        report.transcript.push(ChatTurn::assistant(partial.clone()));
                    }
                    last_partial = partial;

                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            report.end = LoopEnd::Cancelled;
                            break 'turns;
                        }
                        outcome = self
                            .processor
                            .process(&call, &dispatch, slots.as_ref(), allow_actions) => outcome,
                    };

                    if outcome.skipped.is_some() {
                        let message = outcome.user_message.clone().unwrap_or_default();
                        report.transcript.push(ChatTurn::assistant(message.clone()));
                        report.final_text = format!("{last_partial}\n\n{message}").trim().to_string();
                        report.outcomes.push(outcome);
                        report.end = LoopEnd::Skipped;
                        self.finish(&mut report, &sink, message).await;
                        break 'turns;
                    }

                    if let (Some(action), Some(data)) = (&outcome.action, &outcome.action_data) {
                        report.action = Some(action.clone());
                        report.action_data = Some(data.clone());
                        let event = ChatEvent::ActionEvent {
                            action: action.clone(),
                            action_data: data.clone(),
                        };
                        if !sink.emit(event).await {
                            report.outcomes.push(outcome);
                            report.end = LoopEnd::Cancelled;
                            break 'turns;
                        }
                    }
                    if let Some(feedback) = &outcome.feedback {
                        messages.push(ProviderMessage::new("user", feedback.clone()));
                        report.transcript.push(ChatTurn {
                            role: FEEDBACK_ROLE.to_string(),
                            text: feedback.clone(),
                        });
                    }
                    report.outcomes.push(outcome);

                    if state.exhausted() {
                        let text = if last_partial.is_empty() {
                            report
                                .outcomes
                                .last()
                                .and_then(|o| o.user_message.clone())
                                .unwrap_or_default()
                        } else {
                            last_partial.clone()
                        };
                        warn!(turns = state.turn(), "tool loop exhausted its turn budget");
                        if !text.is_empty() && text != last_partial {
                            report.transcript.push(ChatTurn::assistant(text.clone()));
                        }
                        report.final_text = text.clone();
                        report.end = LoopEnd::Exhausted;
                        self.finish(&mut report, &sink, text).await;
                        break 'turns;
                    }
                }
            }
        }

        let usage = state.usage();
        info!(
            turns = report.turns_used,
            chunks = state.chunks(),
            first_token_ms = timing.first_token.map(|d| d.as_millis() as u64),
            total_ms = timing.started.elapsed().as_millis() as u64,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            tools = report.outcomes.len(),
            end = ?report.end,
            "agent loop finished"
        );
        report
    }

    /// Emit `Final` (when there is text) and `Done`.
    async fn finish(&self, report: &mut LoopReport, sink: &Sink<'_>, text: String) {
        if !text.is_empty() {
            let event = ChatEvent::Final {
                text,
                action: report.action.clone(),
                action_data: report.action_data.clone(),
            };
            if !sink.emit(event).await {
                report.end = LoopEnd::Cancelled;
                return;
            }
        }
        if !sink.emit(ChatEvent::Done).await {
            report.end = LoopEnd::Cancelled;
        }
    }

    async fn fail(&self, report: &mut LoopReport, sink: &Sink<'_>, message: String) {
        warn!(error = %message, "model call failed");
        report.end = LoopEnd::Failed(message.clone());
        let _ = sink.emit(ChatEvent::Error { message }).await;
    }
}

/// Provider errors are reported by their message alone.
fn error_message(e: &ConciergeError) -> String {
    match e {
        ConciergeError::Provider { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Replay a complete response as the chunks a stream would have produced.
fn response_chunks(response: ProviderResponse) -> Vec<ProviderStreamChunk> {
    let mut chunks = Vec::with_capacity(3);
    if !response.content.is_empty() {
        chunks.push(ProviderStreamChunk::delta(response.content));
    }
    if let Some(call) = response.tool_call {
        chunks.push(ProviderStreamChunk::tool_call(call));
    }
    chunks.push(ProviderStreamChunk::done(Some(response.usage)));
    chunks
}
