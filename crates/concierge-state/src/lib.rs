// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state for the Concierge chat engine.
//!
//! [`ConversationStore`] keeps per-conversation state in memory under LRU
//! capacity and TTL limits. [`StateUpdater`] derives slots from new turns.

pub mod state;
pub mod store;
pub mod updater;

pub use state::{ConversationState, PinnedEntity, Slots, slot};
pub use store::ConversationStore;
pub use updater::{StateUpdater, contains_keyword, new_turns};
