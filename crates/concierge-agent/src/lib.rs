// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent loop and request orchestration for the Concierge chat engine.
//!
//! [`ChatEngine`] owns every subsystem and answers [`ChatRequest`]s either
//! in one piece ([`ChatEngine::chat`]) or as a stream of [`ChatEvent`]s
//! ([`ChatEngine::chat_stream`]). The model/tool loop itself lives in
//! [`AgentLoop`]; tool calls are gated and summarized by
//! [`OutcomeProcessor`].

pub mod agent;
pub mod engine;
pub mod events;
pub mod outcome;
pub mod responses;
pub mod turn;

pub use agent::{AgentLoop, FEEDBACK_ROLE, LoopEnd, LoopInput, LoopReport};
pub use engine::{ChatEngine, EngineServices, PreparedTurn, WarmUpReport};
pub use events::{ChatEvent, ChatRequest, ChatResponse};
pub use outcome::{OutcomeProcessor, SkipReason, ToolOutcome};
pub use responses::ToolResponses;
pub use turn::{LoopState, Transition, TurnEnd};
