// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use concierge_config::model::StateConfig;
use concierge_core::ChatTurn;
use concierge_state::{ConversationStore, StateUpdater};

#[test]
fn store_and_updater_round_trip() {
    let config = StateConfig::default();
    let store = ConversationStore::from_config(&config);
    let updater = StateUpdater::new(&config, 900);

    let state = store.get_or_create("conv-1", "en");
    let state = updater.apply(
        state,
        &[ChatTurn::user("Hi, my name is Ana. My email is ana@shop.test")],
    );
    store.upsert(state);

    let state = store.get_or_create("conv-1", "en");
    assert_eq!(state.slots.get_str("name"), Some("Ana"));
    assert_eq!(state.slots.get_str("email"), Some("ana@shop.test"));
    assert_eq!(state.recent_turns.len(), 1);

    let state = updater.apply(state, &[ChatTurn::user("yes, send it")]);
    assert_eq!(state.stage(updater.confirmation_slot()).as_deref(), Some("confirm_send"));
}

#[test]
fn distinct_ids_proceed_in_parallel() {
    let store = Arc::new(ConversationStore::new(64, Duration::from_secs(60)));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..8 {
                    let id = format!("t{t}-c{i}");
                    let mut state = store.get_or_create(&id, "en");
                    state.summary = id.clone();
                    store.upsert(state);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.len(), 64);
    assert_eq!(store.peek("t3-c5").unwrap().summary, "t3-c5");
}
