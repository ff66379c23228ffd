// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool definitions and the built-in tool catalog.

use std::collections::BTreeMap;

use concierge_config::model::ToolOverride;
use serde::Serialize;
use serde_json::{Value, json};
use strum::{Display, EnumIter, EnumString};

/// Arguments that reference a catalog item and are subject to pinning.
pub const ENTITY_ARGUMENTS: [&str; 2] = ["product_id", "product_slug"];

/// Backend implementation a tool is bound to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    GetProductDetails,
    ProductSearch,
    SendInquiry,
}

/// A callable tool as exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    /// Localized description keyed by locale.
    pub description: BTreeMap<String, String>,
    /// JSON schema of the arguments object.
    pub parameters: Value,
    pub required_slots: Vec<String>,
    /// Intents the tool is offered for. Empty offers it for every intent.
    pub intents: Vec<String>,
    pub enabled: bool,
    pub confirmation_required: bool,
    pub handler: HandlerKind,
    /// Localized policy text appended to the system prompt.
    pub policy: BTreeMap<String, String>,
}

fn localized<'a>(texts: &'a BTreeMap<String, String>, locale: &str) -> &'a str {
    texts
        .get(locale)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| texts.get("en"))
        .map(|s| s.trim())
        .unwrap_or("")
}

fn empty_parameters() -> Value {
    json!({"type": "object", "properties": {}})
}

impl ToolSpec {
    pub fn description_for(&self, locale: &str) -> &str {
        localized(&self.description, locale)
    }

    pub fn policy_for(&self, locale: &str) -> &str {
        localized(&self.policy, locale)
    }

    /// The argument schema, with an empty object schema standing in for none.
    pub fn schema(&self) -> Value {
        match &self.parameters {
            Value::Object(map) if !map.is_empty() => self.parameters.clone(),
            _ => empty_parameters(),
        }
    }

    /// Flat function descriptor: `{"type":"function", name, description, parameters}`.
    pub fn descriptor(&self, locale: &str) -> Value {
        json!({
            "type": "function",
            "name": self.name,
            "description": self.description_for(locale),
            "parameters": self.schema(),
        })
    }

    /// Whether the argument schema declares `property`.
    pub fn declares(&self, property: &str) -> bool {
        self.parameters
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| props.contains_key(property))
    }

    /// Whether any argument names a catalog item.
    pub fn references_entity(&self) -> bool {
        ENTITY_ARGUMENTS.iter().any(|p| self.declares(p))
    }

    /// Apply a partial override. `handler` must already be resolved.
    pub(crate) fn merge(&mut self, over: &ToolOverride, handler: HandlerKind) {
        if let Some(description) = &over.description {
            self.description = description.clone();
        }
        if let Some(parameters) = over.parameters.as_ref().filter(|p| p.is_object()) {
            self.parameters = parameters.clone();
        }
        if let Some(slots) = &over.required_slots {
            self.required_slots = slots.clone();
        }
        if let Some(intents) = &over.intents {
            self.intents = intents.clone();
        }
        if let Some(enabled) = over.enabled {
            self.enabled = enabled;
        }
        if let Some(required) = over.confirmation_required {
            self.confirmation_required = required;
        }
        if let Some(policy) = &over.policy {
            self.policy = policy.clone();
        }
        self.handler = handler;
    }

    /// A config-defined tool with no built-in base.
    pub(crate) fn from_override(name: &str, over: &ToolOverride, handler: HandlerKind) -> Self {
        let mut spec = Self {
            name: name.to_string(),
            description: BTreeMap::new(),
            parameters: empty_parameters(),
            required_slots: Vec::new(),
            intents: Vec::new(),
            enabled: true,
            confirmation_required: false,
            handler,
            policy: BTreeMap::new(),
        };
        spec.merge(over, handler);
        spec
    }
}

fn texts(en: &str, zh: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("en".to_string(), en.to_string()), ("zh".to_string(), zh.to_string())])
}

/// The tools available without any configuration.
pub fn builtin_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "get_product_details".into(),
            description: texts(
                "Fetch the full catalog record of one product by its id.",
                "按产品 id 获取完整的产品资料。",
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "product_id": {"type": "string", "description": "Catalog id of the product"}
                },
                "required": ["product_id"]
            }),
            required_slots: Vec::new(),
            intents: Vec::new(),
            enabled: true,
            confirmation_required: false,
            handler: HandlerKind::GetProductDetails,
            policy: texts(
                "Call get_product_details when the customer asks for specifics of a product that the context does not cover.",
                "当客户询问上下文未包含的产品细节时，调用 get_product_details。",
            ),
        },
        ToolSpec {
            name: "product_search".into(),
            description: texts(
                "Search the product catalog by free text.",
                "按关键词搜索产品目录。",
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "What the customer is looking for"},
                    "limit": {"type": "integer", "default": 5, "minimum": 1, "maximum": 20}
                },
                "required": ["query"]
            }),
            required_slots: Vec::new(),
            intents: Vec::new(),
            enabled: true,
            confirmation_required: false,
            handler: HandlerKind::ProductSearch,
            policy: texts(
                "Use product_search when the provided product context does not answer the question.",
                "当已有产品上下文无法回答问题时，使用 product_search。",
            ),
        },
        ToolSpec {
            name: "send_inquiry".into(),
            description: texts(
                "Send the customer's inquiry to the sales team. Only call after the customer explicitly confirmed sending.",
                "将客户询盘发送给销售团队。仅在客户明确确认发送后调用。",
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Customer name"},
                    "email": {"type": "string", "description": "Customer email"},
                    "message": {"type": "string", "description": "Inquiry text summarizing the request"},
                    "product_id": {"type": "string"},
                    "product_slug": {"type": "string"}
                },
                "required": ["name", "email", "message"],
                "additionalProperties": false
            }),
            required_slots: vec!["name".into(), "email".into()],
            intents: vec!["inquiry".into(), "purchase".into()],
            enabled: true,
            confirmation_required: true,
            handler: HandlerKind::SendInquiry,
            policy: texts(
                "Before calling send_inquiry, collect name, email and the request, read them back and wait for the customer to confirm sending.",
                "调用 send_inquiry 之前，先收集姓名、邮箱和需求，复述确认，并等待客户明确同意发送。",
            ),
        },
    ]
}
