// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use concierge_core::ChatTurn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known slot names.
pub mod slot {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const QUANTITY: &str = "quantity";
    pub const PRODUCT_ID: &str = "product_id";
}

/// The catalog item a conversation is focused on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedEntity {
    /// Catalog item id.
    pub id: String,
    /// May be empty until resolved against the catalog.
    #[serde(default)]
    pub slug: String,
}

impl PinnedEntity {
    pub fn new(id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
        }
    }
}

/// Structured facts extracted from the conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slots(BTreeMap<String, Value>);

impl Slots {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// A non-empty string slot.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// A boolean slot; anything other than `true` reads as false.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(Value::Bool(true)))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the engine remembers about one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Client-supplied conversation id.
    pub id: String,
    /// Locale of the latest request.
    pub locale: String,
    /// Compressed record of turns that fell out of `recent_turns`.
    pub summary: String,
    pub slots: Slots,
    /// Bounded tail of the transcript, oldest first.
    pub recent_turns: Vec<ChatTurn>,
    /// Focus product; survives until another product is named.
    pub active_product: Option<PinnedEntity>,
    /// Last write; drives TTL expiry.
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(id: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locale: locale.into(),
            summary: String::new(),
            slots: Slots::default(),
            recent_turns: Vec::new(),
            active_product: None,
            updated_at: Utc::now(),
        }
    }

    /// Pin the focus product and mirror it into the `product_id` slot.
    pub fn pin(&mut self, entity: PinnedEntity) {
        self.slots.set(slot::PRODUCT_ID, entity.id.clone());
        self.active_product = Some(entity);
    }

    pub fn unpin(&mut self) {
        self.slots.remove(slot::PRODUCT_ID);
        self.active_product = None;
    }

    /// The conversation stage: the confirmation slot's name while it is set.
    pub fn stage(&self, confirmation_slot: &str) -> Option<String> {
        self.slots
            .flag(confirmation_slot)
            .then(|| confirmation_slot.to_string())
    }
}
