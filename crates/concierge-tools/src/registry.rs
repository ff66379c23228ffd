// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool registry: built-in catalog merged with configuration, and per-turn
//! gating of what the model may call.
//!
//! Registration resolves every handler key and compiles every argument
//! schema up front. A tool whose handler key is unknown, or whose schema
//! does not compile, is logged and left out; it never fails startup.

use std::collections::BTreeMap;
use std::str::FromStr;

use concierge_config::ConciergeConfig;
use concierge_config::model::ToolOverride;
use concierge_router::RouteDecision;
use concierge_state::Slots;
use jsonschema::Validator;
use serde_json::Value;
use tracing::{debug, warn};

use crate::spec::{HandlerKind, ToolSpec, builtin_specs};

pub(crate) struct RegisteredTool {
    pub(crate) spec: ToolSpec,
    pub(crate) validator: Validator,
}

pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
    confirmation_slot: String,
}

impl ToolRegistry {
    /// Merge `overrides` field-by-field over the built-in catalog.
    pub fn new(overrides: &BTreeMap<String, ToolOverride>, confirmation_slot: &str) -> Self {
        let mut specs: BTreeMap<String, ToolSpec> = builtin_specs()
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();

        for (name, over) in overrides {
            let handler = match over.handler.as_deref().map(str::trim) {
                Some(key) => match HandlerKind::from_str(key) {
                    Ok(kind) => kind,
                    Err(_) => {
                        warn!(tool = %name, handler = %key, "unknown tool handler, tool omitted");
                        specs.remove(name);
                        continue;
                    }
                },
                None => match specs.get(name) {
                    Some(base) => base.handler,
                    None => {
                        warn!(tool = %name, "tool has no handler, tool omitted");
                        continue;
                    }
                },
            };
            match specs.get_mut(name) {
                Some(base) => base.merge(over, handler),
                None => {
                    specs.insert(name.clone(), ToolSpec::from_override(name, over, handler));
                }
            }
        }

        let mut tools = BTreeMap::new();
        for (name, spec) in specs {
            match jsonschema::validator_for(&spec.schema()) {
                Ok(validator) => {
                    tools.insert(name, RegisteredTool { spec, validator });
                }
                Err(e) => warn!(tool = %name, error = %e, "invalid tool schema, tool omitted"),
            }
        }

        debug!(tools = tools.len(), "tool registry built");
        Self {
            tools,
            confirmation_slot: confirmation_slot.to_string(),
        }
    }

    pub fn from_config(config: &ConciergeConfig) -> Self {
        Self::new(&config.tools, &config.state.confirmation_slot)
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name).map(|t| &t.spec)
    }

    pub(crate) fn registered(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// All registered specs, sorted by name.
    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values().map(|t| &t.spec)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools the model may call this turn.
    ///
    /// Disabled tools are dropped. In the confirmation stage only
    /// confirmation-required tools remain, and they bypass intent gating.
    /// Outside it, a tool listing intents is offered only for those intents.
    /// Missing required slots do not hide a tool; the model is expected to
    /// ask for them.
    pub fn allowed(&self, decision: &RouteDecision, slots: &Slots) -> Vec<&ToolSpec> {
        let confirming = decision.in_stage(&self.confirmation_slot);
        self.specs()
            .filter(|spec| spec.enabled)
            .filter(|spec| !confirming || spec.confirmation_required)
            .filter(|spec| {
                spec.intents.is_empty()
                    || (confirming && spec.confirmation_required)
                    || spec.intents.contains(&decision.intent)
            })
            .inspect(|spec| {
                let missing: Vec<&str> = spec
                    .required_slots
                    .iter()
                    .filter(|s| slots.get_str(s).is_none())
                    .map(String::as_str)
                    .collect();
                if !missing.is_empty() {
                    debug!(tool = %spec.name, ?missing, "tool offered with missing slots");
                }
            })
            .collect()
    }

    /// Localized descriptors for the tools allowed this turn. An empty list
    /// disables tool calling for the turn.
    pub fn get_allowed_tools(
        &self,
        locale: &str,
        decision: &RouteDecision,
        slots: &Slots,
    ) -> Vec<Value> {
        self.allowed(decision, slots)
            .into_iter()
            .map(|spec| spec.descriptor(locale))
            .collect()
    }
}
