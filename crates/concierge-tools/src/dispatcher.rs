// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool dispatch: lookup, entity pinning, argument validation and handler
//! invocation.
//!
//! [`ToolDispatcher::dispatch`] never returns an error or panics on bad
//! input. Every failure is a [`ToolError`] value inside the returned
//! [`DispatchOutcome`], so the caller can feed it back to the model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use concierge_core::ConciergeError;
use concierge_state::PinnedEntity;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::args::{normalize_arguments, schema_errors};
use crate::registry::ToolRegistry;
use crate::spec::HandlerKind;

/// Per-call context handed to handlers.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    pub locale: String,
    /// The conversation's focus product, if any.
    pub pinned: Option<PinnedEntity>,
    /// Recorded on side effects, e.g. the inquiry source.
    pub source: String,
}

impl DispatchContext {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            pinned: None,
            source: "chat_tool".into(),
        }
    }

    pub fn with_pinned(mut self, pinned: Option<PinnedEntity>) -> Self {
        self.pinned = pinned;
        self
    }
}

/// Why a tool call did not produce a handler result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Tool '{tool}' is not configured")]
    Unconfigured { tool: String },

    #[error("Handler implementation '{handler}' missing")]
    MissingHandler { tool: String, handler: HandlerKind },

    #[error("Validation Error: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("{message}")]
    Handler { message: String },
}

/// Result of one dispatched tool call.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub tool: String,
    pub handler: Option<HandlerKind>,
    /// Arguments as executed, after pinning and normalization.
    pub arguments: Value,
    pub result: Result<Value, ToolError>,
}

impl DispatchOutcome {
    fn failed(tool: &str, handler: Option<HandlerKind>, arguments: Value, error: ToolError) -> Self {
        Self {
            tool: tool.to_string(),
            handler,
            arguments,
            result: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// A backend implementation bound to one [`HandlerKind`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    /// Run with validated arguments.
    async fn invoke(&self, args: Value, ctx: &DispatchContext) -> Result<Value, ConciergeError>;
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    handlers: HashMap<HandlerKind, Arc<dyn ToolHandler>>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            handlers: HashMap::new(),
        }
    }

    /// Bind a handler to its kind, replacing any earlier binding.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn with_handlers(mut self, handlers: impl IntoIterator<Item = Arc<dyn ToolHandler>>) -> Self {
        for handler in handlers {
            self.register(handler);
        }
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute one tool call.
    pub async fn dispatch(&self, tool: &str, raw_args: Value, ctx: &DispatchContext) -> DispatchOutcome {
        let Some(registered) = self.registry.registered(tool) else {
            warn!(tool = %tool, "call to unconfigured tool");
            return DispatchOutcome::failed(
                tool,
                None,
                raw_args,
                ToolError::Unconfigured { tool: tool.to_string() },
            );
        };
        let spec = &registered.spec;

        let mut args = match normalize_arguments(spec, raw_args.clone()) {
            Ok(args) => args,
            Err(errors) => {
                return DispatchOutcome::failed(
                    tool,
                    Some(spec.handler),
                    raw_args,
                    ToolError::Validation { errors },
                );
            }
        };

        if let Some(pinned) = &ctx.pinned {
            pin_entity(spec.declares("product_id"), spec.declares("product_slug"), pinned, &mut args);
        }

        let errors = schema_errors(&registered.validator, &args);
        let arguments = Value::Object(args);
        if !errors.is_empty() {
            debug!(tool = %tool, ?errors, "tool arguments rejected");
            return DispatchOutcome::failed(
                tool,
                Some(spec.handler),
                arguments,
                ToolError::Validation { errors },
            );
        }

        let Some(handler) = self.handlers.get(&spec.handler) else {
            warn!(tool = %tool, handler = %spec.handler, "no handler bound");
            return DispatchOutcome::failed(
                tool,
                Some(spec.handler),
                arguments,
                ToolError::MissingHandler {
                    tool: tool.to_string(),
                    handler: spec.handler,
                },
            );
        };

        let started = Instant::now();
        let result = handler.invoke(arguments.clone(), ctx).await.map_err(|e| {
            warn!(tool = %tool, error = %e, "tool handler failed");
            ToolError::Handler {
                message: e.to_string(),
            }
        });
        info!(
            tool = %tool,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool executed"
        );

        DispatchOutcome {
            tool: tool.to_string(),
            handler: Some(spec.handler),
            arguments,
            result,
        }
    }
}

/// Overwrite declared entity arguments with the pinned entity.
///
/// A pinned entity without a known slug removes any caller-supplied slug so
/// the call cannot name a second product.
fn pin_entity(has_id: bool, has_slug: bool, pinned: &PinnedEntity, args: &mut Map<String, Value>) {
    if has_id && !pinned.id.is_empty() {
        if let Some(previous) = args.get("product_id").and_then(Value::as_str)
            && previous != pinned.id
        {
            info!(requested = %previous, pinned = %pinned.id, "entity argument replaced by pinned product");
        }
        args.insert("product_id".into(), Value::String(pinned.id.clone()));
    }
    if has_slug {
        if pinned.slug.is_empty() {
            args.remove("product_slug");
        } else {
            args.insert("product_slug".into(), Value::String(pinned.slug.clone()));
        }
    }
}
