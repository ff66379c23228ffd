// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation store with LRU capacity and TTL expiry.
//!
//! All bookkeeping sits behind one short critical section; states are
//! cloned out and written back, so a request never holds the lock while it
//! waits on the model.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use concierge_config::model::StateConfig;
use lru::LruCache;
use tracing::debug;

use crate::state::ConversationState;

struct Entry {
    state: ConversationState,
    touched: Instant,
}

pub struct ConversationStore {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(max_items: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_items).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn from_config(config: &StateConfig) -> Self {
        Self::new(config.max_items, Duration::from_secs(config.ttl_secs))
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live state for `id`, promoted to most-recently-used, or a fresh
    /// state when absent or expired. A differing non-empty `locale` replaces
    /// the stored one.
    pub fn get_or_create(&self, id: &str, locale: &str) -> ConversationState {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(id) {
            if entry.touched.elapsed() <= self.ttl {
                if !locale.is_empty() && entry.state.locale != locale {
                    entry.state.locale = locale.to_string();
                }
                return entry.state.clone();
            }
            debug!(conversation_id = %id, "conversation expired");
            entries.pop(id);
        }

        let state = ConversationState::new(id, locale);
        if let Some((evicted, _)) = entries.push(
            id.to_string(),
            Entry {
                state: state.clone(),
                touched: Instant::now(),
            },
        ) && evicted != id
        {
            debug!(conversation_id = %evicted, "conversation evicted");
        }
        state
    }

    /// Store `state`, promoting it to most-recently-used. Returns the id
    /// evicted to make room, if any.
    pub fn upsert(&self, mut state: ConversationState) -> Option<String> {
        state.updated_at = Utc::now();
        let id = state.id.clone();
        let mut entries = self.lock();
        let evicted = entries
            .push(
                id.clone(),
                Entry {
                    state,
                    touched: Instant::now(),
                },
            )
            .map(|(key, _)| key)
            .filter(|key| *key != id);
        if let Some(key) = &evicted {
            debug!(conversation_id = %key, "conversation evicted");
        }
        evicted
    }

    /// Current state without promoting it.
    pub fn peek(&self, id: &str) -> Option<ConversationState> {
        self.lock().peek(id).map(|e| e.state.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn remove(&self, id: &str) -> Option<ConversationState> {
        self.lock().pop(id).map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids from least to most recently used.
    pub fn ids_by_recency(&self) -> Vec<String> {
        self.lock().iter().rev().map(|(k, _)| k.clone()).collect()
    }
}
