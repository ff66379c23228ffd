// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning a model's tool call into feedback for the next model turn.
//!
//! Sensitive tools (those requiring confirmation) are gated before
//! dispatch: without `allow_actions`, or with required fields missing, the
//! call is skipped and the customer gets a direct message instead.

use std::sync::Arc;

use concierge_core::ToolCall;
use concierge_retrieval::normalize::truncate_chars;
use concierge_state::Slots;
use concierge_tools::{DispatchContext, HandlerKind, ToolDispatcher, ToolSpec};
use serde::Serialize;
use serde_json::{Value, json};
use strum::Display;
use tracing::{info, warn};

use crate::responses::{CONFIRM_NEEDED, FAILURE, MISSING_INFO, SUCCESS, ToolResponses};

pub const ACTION_SEND_INQUIRY: &str = "send_inquiry";
pub const ACTION_SEND_INQUIRY_FAILED: &str = "send_inquiry_failed";
pub const ACTION_PRODUCT_SEARCH: &str = "product_search";

const TRUNCATED_MARKER: &str = "...(truncated)";

/// Why a sensitive call was not executed.
/// Why a tool call was answered without running the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The tool needs confirmation the user has not given.
    ConfirmNeeded,
    /// Required slots or arguments are missing.
    MissingFields,
}

/// Everything the loop and the engine need to know about one tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolOutcome {
    /// Tool name the model called.
    pub tool: String,
    /// `None` when the name is unknown.
    pub handler: Option<HandlerKind>,
    /// Arguments as executed, or as requested when the call never ran.
    pub arguments: Value,
    pub success: bool,
    /// Handler output on success.
    pub result: Option<Value>,
    /// Failure message when `success` is false.
    pub error: Option<String>,
    /// Client-visible action name, e.g. `product_search` or `send_inquiry`.
    pub action: Option<String>,
    pub action_data: Option<Value>,
    /// Synthetic message for the model's next turn.
    pub feedback: Option<String>,
    /// Text addressed to the customer directly.
    pub user_message: Option<String>,
    /// Set when the handler never ran.
    pub skipped: Option<SkipReason>,
}

impl ToolOutcome {
    fn new(call: &ToolCall, handler: Option<HandlerKind>) -> Self {
        Self {
            tool: call.name.clone(),
            handler,
            arguments: call.arguments.clone(),
            ..Default::default()
        }
    }
}

/// Error text carried by a handler result: a truthy `error` field, or
/// `ok: false`.
pub fn result_error(result: &Value) -> Option<String> {
    match result.get("error") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(Value::Null) | Some(Value::Bool(false)) | None => {}
        Some(other) => return Some(other.to_string()),
    }
    (result.get("ok") == Some(&Value::Bool(false))).then(|| "Unknown error".to_string())
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn required_fields(spec: &ToolSpec) -> Vec<String> {
    spec.parameters
        .get("required")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub struct OutcomeProcessor {
    dispatcher: Arc<ToolDispatcher>,
    responses: ToolResponses,
    output_max_chars: usize,
}

impl OutcomeProcessor {
    pub fn new(dispatcher: Arc<ToolDispatcher>, responses: ToolResponses, output_max_chars: usize) -> Self {
        Self {
            dispatcher,
            responses,
            output_max_chars,
        }
    }

    pub fn responses(&self) -> &ToolResponses {
        &self.responses
    }

    /// Gate, dispatch and summarize one tool call.
    pub async fn process(
        &self,
        call: &ToolCall,
        ctx: &DispatchContext,
        slots: Option<&Slots>,
        allow_actions: bool,
    ) -> ToolOutcome {
        let spec = self.dispatcher.registry().get(&call.name).cloned();
        let mut outcome = ToolOutcome::new(call, spec.as_ref().map(|s| s.handler));
        let mut arguments = call.arguments.clone();

        if let Some(spec) = &spec {
            fill_from_slots(spec, &mut arguments, slots);
            outcome.arguments = arguments.clone();

            if spec.confirmation_required {
                if !allow_actions {
                    return self.skip(outcome, SkipReason::ConfirmNeeded, CONFIRM_NEEDED, &ctx.locale);
                }
                let missing: Vec<String> = required_fields(spec)
                    .into_iter()
                    .filter(|f| is_blank(arguments.get(f)))
                    .collect();
                if !missing.is_empty() {
                    info!(tool = %call.name, ?missing, "sensitive tool missing fields");
                    return self.skip(outcome, SkipReason::MissingFields, MISSING_INFO, &ctx.locale);
                }
            }
        }

        let dispatched = self.dispatcher.dispatch(&call.name, arguments, ctx).await;
        outcome.arguments = dispatched.arguments.clone();
        outcome.handler = dispatched.handler;

        let error = match &dispatched.result {
            Ok(value) => result_error(value),
            Err(e) => Some(e.to_string()),
        };
        outcome.result = dispatched.result.ok();

        match error {
            Some(error) => self.failed(outcome, error, &ctx.locale),
            None => self.succeeded(outcome, &ctx.locale),
        }
    }

    fn skip(&self, mut outcome: ToolOutcome, reason: SkipReason, key: &str, locale: &str) -> ToolOutcome {
        info!(tool = %outcome.tool, reason = %reason, "tool call skipped");
        outcome.skipped = Some(reason);
        outcome.user_message = Some(self.responses.get(key, locale, &[]));
        outcome
    }

    fn failed(&self, mut outcome: ToolOutcome, error: String, locale: &str) -> ToolOutcome {
        warn!(tool = %outcome.tool, error = %error, "tool call failed");
        outcome.feedback = Some(format!(
            "System Notification: Tool '{}' failed. Error: {error}",
            outcome.tool
        ));
        outcome.user_message = Some(self.responses.get(FAILURE, locale, &[("error", &error)]));
        if outcome.handler == Some(HandlerKind::SendInquiry) {
            let inquiry_id = outcome
                .result
                .as_ref()
                .and_then(|r| r.get("inquiry_id"))
                .cloned()
                .unwrap_or(Value::Null);
            outcome.action = Some(ACTION_SEND_INQUIRY_FAILED.to_string());
            outcome.action_data = Some(json!({"inquiry_id": inquiry_id, "error": error}));
        }
        outcome.error = Some(error);
        outcome
    }

    fn succeeded(&self, mut outcome: ToolOutcome, locale: &str) -> ToolOutcome {
        outcome.success = true;
        let result = outcome.result.clone().unwrap_or(Value::Null);
        let name = outcome.tool.clone();

        match outcome.handler {
            Some(HandlerKind::SendInquiry) => {
                let inquiry_id = result.get("inquiry_id").cloned().unwrap_or(Value::Null);
                let delivery_id = result.get("delivery_id").cloned().unwrap_or(Value::Null);
                let id_text = inquiry_id.as_str().unwrap_or_default().to_string();
                outcome.feedback = Some(if delivery_id.is_null() {
                    format!(
                        "System Notification: Tool '{name}' executed successfully. Inquiry ID: {id_text}. \
                         The inquiry has been recorded and the sales team will follow up. \
                         Please confirm to the user that it is done."
                    )
                } else {
                    format!(
                        "System Notification: Tool '{name}' executed successfully. Inquiry ID: {id_text}. \
                         The email HAS been sent. Please confirm to the user that it is done."
                    )
                });
                outcome.action = Some(ACTION_SEND_INQUIRY.to_string());
                outcome.action_data = Some(json!({"inquiry_id": inquiry_id, "delivery_id": delivery_id}));
                outcome.user_message = Some(self.responses.get(SUCCESS, locale, &[]));
            }
            Some(HandlerKind::ProductSearch) => {
                let count = result
                    .get("results")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                outcome.feedback = Some(format!(
                    "System Notification: Tool '{name}' returned {count} results. \
                     Please summarize or recommend based on these results."
                ));
                outcome.action = Some(ACTION_PRODUCT_SEARCH.to_string());
                outcome.action_data = Some(result);
            }
            Some(HandlerKind::GetProductDetails) | None => {
                outcome.feedback = Some(format!(
                    "System Notification: Tool '{name}' output: {}",
                    self.truncated(&result)
                ));
            }
        }
        info!(tool = %name, action = ?outcome.action, "tool call succeeded");
        outcome
    }

    fn truncated(&self, result: &Value) -> String {
        let text = result.to_string();
        let cut = truncate_chars(&text, self.output_max_chars);
        if cut.len() < text.len() {
            format!("{cut}{TRUNCATED_MARKER}")
        } else {
            text
        }
    }
}

/// Fill blank arguments named by the tool's required slots from the
/// conversation slots, when the schema declares them.
fn fill_from_slots(spec: &ToolSpec, arguments: &mut Value, slots: Option<&Slots>) {
    let Some(slots) = slots else {
        return;
    };
    if arguments.is_null() {
        *arguments = Value::Object(Default::default());
    }
    let Some(args) = arguments.as_object_mut() else {
        return;
    };
    for slot in &spec.required_slots {
        if !spec.declares(slot) || !is_blank(args.get(slot)) {
            continue;
        }
        if let Some(value) = slots.get_str(slot) {
            args.insert(slot.clone(), Value::String(value.to_string()));
        }
    }
}
