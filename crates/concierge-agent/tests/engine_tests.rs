// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the chat engine over scripted providers.

use std::sync::Arc;
use std::time::Duration;

use concierge_agent::{ChatEngine, ChatEvent, ChatRequest, EngineServices, LoopEnd};
use concierge_config::load_config_from_str;
use concierge_core::{ChatTurn, Notifier};
use concierge_test_utils::fixtures::{BACKPACK_ID, BACKPACK_SLUG};
use concierge_test_utils::{CatalogDir, MemoryStorage, MockEmbedder, MockProvider, MockTurn, RecordingNotifier};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Harness {
    engine: Arc<ChatEngine>,
    provider: Arc<MockProvider>,
    storage: Arc<MemoryStorage>,
    notifier: Arc<RecordingNotifier>,
    _dir: CatalogDir,
}

async fn harness(turns: Vec<MockTurn>) -> Harness {
    harness_with(turns, "").await
}

async fn harness_with(turns: Vec<MockTurn>, extra_toml: &str) -> Harness {
    build(turns, extra_toml, RecordingNotifier::new()).await
}

async fn build(turns: Vec<MockTurn>, extra_toml: &str, notifier: RecordingNotifier) -> Harness {
    let dir = CatalogDir::create().unwrap();
    let config = load_config_from_str(&format!(
        r#"
[engine]
company_name = "Jwl Bags"

[catalog]
products_path = "{}"
kb_dir = "{}"
site_info_path = "{}"

{}
"#,
        dir.products_path().display(),
        dir.kb_dir().display(),
        dir.site_info_path().display(),
        extra_toml,
    ))
    .unwrap();

    let provider = Arc::new(MockProvider::with_turns(turns));
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(notifier);
    let engine = ChatEngine::new(
        &config,
        EngineServices {
            provider: provider.clone(),
            embedder: Arc::new(MockEmbedder::new(256)),
            storage: storage.clone(),
            notifier: Some(notifier.clone() as Arc<dyn Notifier>),
        },
    );
    let report = engine.warm_up().await;
    assert_eq!(report.products, 3);
    assert!(report.chunks > 0);

    Harness {
        engine: Arc::new(engine),
        provider,
        storage,
        notifier,
        _dir: dir,
    }
}

async fn collect(mut rx: mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn kinds(events: &[ChatEvent]) -> Vec<&'static str> {
    events.iter().map(ChatEvent::kind).collect()
}

fn final_text(events: &[ChatEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        ChatEvent::Final { text, .. } => Some(text.as_str()),
        _ => None,
    })
}

async fn stream(h: &Harness, request: ChatRequest) -> Vec<ChatEvent> {
    collect(h.engine.clone().chat_stream(request, CancellationToken::new())).await
}

#[tokio::test]
async fn plain_answer_streams_deltas_then_final() {
    let h = harness(vec![MockTurn::deltas(["Hel", "lo "])]).await;
    let events = stream(&h, ChatRequest::new(vec![ChatTurn::user("hi there")])).await;

    assert_eq!(kinds(&events), vec!["delta", "delta", "final", "done"]);
    assert_eq!(final_text(&events), Some("Hello"));
    assert_eq!(h.provider.call_count().await, 1);

    let request = &h.provider.requests().await[0];
    assert_eq!(request.messages[0].role, "system");
    assert_eq!(request.messages.last().unwrap().content, "hi there");
    assert!(request.stream);
}

#[tokio::test]
async fn product_search_feeds_results_back_to_the_model() {
    let h = harness(vec![
        MockTurn::tool("product_search", json!({"query": "hiking backpack"})).with_text("Let me check."),
        MockTurn::text("The Multi-day Hiking Backpack fits best."),
    ])
    .await;
    let events = stream(&h, ChatRequest::new(vec![ChatTurn::user("something for trekking")])).await;

    assert_eq!(
        kinds(&events),
        vec!["delta", "tool_call", "action_event", "delta", "final", "done"]
    );
    match events.iter().find(|e| e.kind() == "final").unwrap() {
        ChatEvent::Final { action, action_data, .. } => {
            assert_eq!(action.as_deref(), Some("product_search"));
            assert_eq!(action_data.as_ref().unwrap()["ok"], true);
        }
        _ => unreachable!(),
    }

    let requests = h.provider.requests().await;
    assert_eq!(requests.len(), 2);
    let second = &requests[1].messages;
    let n = second.len();
    assert_eq!(second[n - 2].role, "assistant");
    assert_eq!(second[n - 2].content, "Let me check.");
    assert_eq!(second[n - 1].role, "user");
    assert!(second[n - 1].content.starts_with("System Notification: Tool 'product_search' returned"));
}

#[tokio::test]
async fn sensitive_tool_without_permission_is_skipped() {
    let h = harness(vec![MockTurn::tool(
        "send_inquiry",
        json!({"name": "Ana", "email": "ana@example.com", "message": "500 bags please"}),
    )])
    .await;
    let events = stream(
        &h,
        ChatRequest::new(vec![ChatTurn::user("send my inquiry")]).with_conversation("c-skip"),
    )
    .await;

    assert_eq!(kinds(&events), vec!["tool_call", "final", "done"]);
    assert!(final_text(&events).unwrap().contains("yes, send it"));
    assert_eq!(h.provider.call_count().await, 1);
    assert!(h.storage.inquiries().await.is_empty());
    assert!(h.notifier.sent().await.is_empty());

    let state = h.engine.store().peek("c-skip").unwrap();
    let last = state.recent_turns.last().unwrap();
    assert_eq!(last.role, "assistant");
    assert!(last.text.contains("yes, send it"));
}

#[tokio::test]
async fn missing_fields_block_sending() {
    let h = harness(vec![MockTurn::tool("send_inquiry", json!({"message": "hello"}))]).await;
    let response = h
        .engine
        .chat(ChatRequest::new(vec![ChatTurn::user("please send it")]).allow_actions(true))
        .await
        .unwrap();

    assert!(response.response.contains("still need"));
    assert_eq!(response.action, None);
    assert!(h.storage.inquiries().await.is_empty());
    assert!(!h.provider.requests().await[0].stream);
}

#[tokio::test]
async fn confirmed_inquiry_is_sent_and_recorded_in_state() {
    let h = harness(vec![
        MockTurn::tool("send_inquiry", json!({"message": "We need 500 pieces."})),
        MockTurn::text("Your inquiry is on its way."),
    ])
    .await;
    let request = ChatRequest::new(vec![ChatTurn::user(
        "My name is Ana, my email is ana@example.com. Please send it to sales.",
    )])
    .with_conversation("c-send")
    .allow_actions(true);
    let events = stream(&h, request).await;

    assert_eq!(
        kinds(&events),
        vec!["user_update", "tool_call", "action_event", "delta", "final", "done"]
    );
    assert_eq!(events[0], ChatEvent::UserUpdate { name: "Ana".into() });

    let tools = h.provider.requests().await[0].tools.clone().unwrap();
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(names, vec!["send_inquiry"]);

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name, "Ana");
    assert_eq!(sent[0].email, "ana@example.com");
    assert_eq!(h.storage.inquiries().await.len(), 1);

    let state = h.engine.store().peek("c-send").unwrap();
    assert_eq!(state.slots.get_str("name"), Some("Ana"));
    assert_eq!(state.slots.get_str("email"), Some("ana@example.com"));
    assert!(!state.slots.flag("confirm_send"));
    assert!(
        state
            .recent_turns
            .iter()
            .any(|t| t.role == "system" && t.text.contains("The email HAS been sent"))
    );
    assert_eq!(state.recent_turns.last().unwrap().text, "Your inquiry is on its way.");
}

#[tokio::test]
async fn tool_loop_stops_at_turn_budget() {
    let h = harness(vec![
        MockTurn::tool("product_search", json!({"query": "bag"})),
        MockTurn::tool("product_search", json!({"query": "bag"})),
        MockTurn::text("never reached"),
    ])
    .await;
    let events = stream(&h, ChatRequest::new(vec![ChatTurn::user("bags?")])).await;

    assert_eq!(h.provider.call_count().await, 2);
    assert_eq!(events.last(), Some(&ChatEvent::Done));
    assert!(final_text(&events).is_none());
    assert!(!events.iter().any(|e| matches!(e, ChatEvent::Error { .. })));
}

#[tokio::test]
async fn cancellation_stops_streaming() {
    let pieces: Vec<String> = (0..10).map(|i| format!("part{i} ")).collect();
    let h = harness(vec![MockTurn::deltas(pieces).with_delay(Duration::from_millis(50))]).await;
    let cancel = CancellationToken::new();
    let mut rx = h
        .engine
        .clone()
        .chat_stream(ChatRequest::new(vec![ChatTurn::user("hello")]), cancel.clone());

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind(), "delta");
    cancel.cancel();

    let rest = collect(rx).await;
    assert!(!rest.iter().any(|e| matches!(e, ChatEvent::Done | ChatEvent::Final { .. })));
    assert_eq!(h.provider.call_count().await, 1);
}

#[tokio::test]
async fn cancellation_interrupts_a_slow_tool_call() {
    let h = build(
        vec![
            MockTurn::tool("send_inquiry", json!({"message": "We need 500 pieces."})),
            MockTurn::text("never reached"),
        ],
        "",
        RecordingNotifier::slow(Duration::from_secs(30)),
    )
    .await;
    let cancel = CancellationToken::new();
    let request = ChatRequest::new(vec![ChatTurn::user(
        "My name is Ana, my email is ana@example.com. Please send it to sales.",
    )])
    .allow_actions(true);
    let mut rx = h.engine.clone().chat_stream(request, cancel.clone());

    loop {
        let event = rx.recv().await.unwrap();
        if event.kind() == "tool_call" {
            break;
        }
    }
    cancel.cancel();

    let rest = tokio::time::timeout(Duration::from_secs(5), collect(rx))
        .await
        .unwrap();
    assert!(!rest.iter().any(|e| matches!(
        e,
        ChatEvent::ActionEvent { .. } | ChatEvent::Final { .. } | ChatEvent::Done
    )));
    assert_eq!(h.provider.call_count().await, 1);
    assert!(h.notifier.sent().await.is_empty());
}

#[tokio::test]
async fn dropped_receiver_ends_the_loop_quietly() {
    let h = harness(vec![MockTurn::text("unheard")]).await;
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let report = h
        .engine
        .stream_into(
            ChatRequest::new(vec![ChatTurn::user("hello")]),
            tx,
            CancellationToken::new(),
        )
        .await;
    assert_eq!(report.end, LoopEnd::Cancelled);
    assert_eq!(h.provider.call_count().await, 1);
}

#[tokio::test]
async fn provider_failure_emits_error_without_done() {
    let h = harness(vec![MockTurn::failing("rate limited")]).await;
    let events = stream(&h, ChatRequest::new(vec![ChatTurn::user("hello")])).await;

    assert_eq!(kinds(&events), vec!["error"]);
    match &events[0] {
        ChatEvent::Error { message } => assert!(message.contains("rate limited")),
        _ => unreachable!(),
    }

    let h = harness(vec![MockTurn::failing("rate limited")]).await;
    let err = h
        .engine
        .chat(ChatRequest::new(vec![ChatTurn::user("hello")]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("rate limited"));
}

#[tokio::test]
async fn exact_match_pins_and_later_turns_keep_focus() {
    let h = harness(vec![MockTurn::text("It is a 60L pack."), MockTurn::text("Red and black.")]).await;

    h.engine
        .chat(
            ChatRequest::new(vec![ChatTurn::user("Tell me about the Multi-day Hiking Backpack")])
                .with_conversation("c-pin"),
        )
        .await
        .unwrap();
    let state = h.engine.store().peek("c-pin").unwrap();
    let pinned = state.active_product.clone().unwrap();
    assert_eq!(pinned.id, BACKPACK_ID);
    assert_eq!(pinned.slug, BACKPACK_SLUG);
    assert_eq!(state.slots.get_str("product_id"), Some(BACKPACK_ID));

    h.engine
        .chat(
            ChatRequest::new(vec![ChatTurn::user("What colors does it come in?")])
                .with_conversation("c-pin"),
        )
        .await
        .unwrap();

    let requests = h.provider.requests().await;
    assert!(requests[0].messages[0].content.contains("[Product Context]"));
    let system = &requests[1].messages[0].content;
    assert!(system.contains("[Current Focus Product]"));
    assert!(system.contains(BACKPACK_ID));
}

#[tokio::test]
async fn pinned_product_overrides_tool_arguments() {
    let h = harness(vec![
        MockTurn::tool(
            "send_inquiry",
            json!({"name": "Ana", "email": "ana@example.com", "message": "Quote please", "product_id": "jwl-tote-007"}),
        ),
        MockTurn::text("Sent."),
    ])
    .await;
    let request = ChatRequest::new(vec![ChatTurn::user(
        "About ID: jwl-outdoor-018, please send it to your sales team.",
    )])
    .with_conversation("c-pinned")
    .allow_actions(true);
    let response = h.engine.chat(request).await.unwrap();

    assert_eq!(response.action.as_deref(), Some("send_inquiry"));
    let inquiries = h.storage.inquiries().await;
    assert_eq!(inquiries.len(), 1);
    assert_eq!(inquiries[0].product_id.as_deref(), Some(BACKPACK_ID));
    assert_eq!(inquiries[0].product_slug.as_deref(), Some(BACKPACK_SLUG));
}

#[tokio::test]
async fn stateless_requests_leave_no_state() {
    let h = harness(vec![MockTurn::text("Hi!")]).await;
    let response = h
        .engine
        .chat(ChatRequest::new(vec![ChatTurn::user("My name is Ana")]))
        .await
        .unwrap();

    assert_eq!(response.response, "Hi!");
    assert!(h.engine.store().is_empty());
    let system = &h.provider.requests().await[0].messages[0].content;
    assert!(!system.contains("Conversation Slots"));
}

#[tokio::test]
async fn details_lookup_pins_the_product() {
    let h = harness(vec![
        MockTurn::tool("get_product_details", json!({"product_id": "jwl-lunch-001"})),
        MockTurn::text("It keeps food cold for six hours."),
    ])
    .await;
    h.engine
        .chat(ChatRequest::new(vec![ChatTurn::user("what about the cooler one?")]).with_conversation("c-details"))
        .await
        .unwrap();

    let state = h.engine.store().peek("c-details").unwrap();
    let pinned = state.active_product.unwrap();
    assert_eq!(pinned.id, "jwl-lunch-001");
    assert_eq!(pinned.slug, "insulated-lunch-bag");

    let second = &h.provider.requests().await[1].messages;
    assert!(
        second
            .last()
            .unwrap()
            .content
            .starts_with("System Notification: Tool 'get_product_details' output:")
    );
}

#[tokio::test]
async fn resent_history_after_tool_turn_is_recorded_once() {
    let h = harness(vec![
        MockTurn::tool("product_search", json!({"query": "lunch bag"})),
        MockTurn::text("Try the lunch bag."),
        MockTurn::text("Sure."),
    ])
    .await;
    let opener = ChatTurn::user("ID: jwl-lunch-001 does it keep drinks cold?");
    h.engine
        .chat(ChatRequest::new(vec![opener.clone()]).with_conversation("c-resend"))
        .await
        .unwrap();
    let state = h.engine.store().peek("c-resend").unwrap();
    assert!(state.recent_turns.iter().any(|t| t.role == "system"));

    let history = vec![
        opener.clone(),
        ChatTurn::assistant("Try the lunch bag."),
        ChatTurn::user("ok thanks"),
    ];
    h.engine
        .chat(ChatRequest::new(history).with_conversation("c-resend"))
        .await
        .unwrap();

    let state = h.engine.store().peek("c-resend").unwrap();
    let texts: Vec<&str> = state.recent_turns.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts.iter().filter(|t| **t == opener.text).count(), 1);
    assert_eq!(texts.iter().filter(|t| **t == "Try the lunch bag.").count(), 1);
    assert_eq!(&texts[texts.len() - 2..], &["ok thanks", "Sure."]);
    assert!(state.summary.is_empty());
}

#[tokio::test]
async fn zeroed_stage_budget_leaves_out_the_focus_product() {
    let h = harness_with(
        vec![MockTurn::text("It is a 60L pack."), MockTurn::text("Shall I send it?")],
        "[retrieval.on_stage.confirm_send]\nproduct_k = 0\nkb_k = 0\n",
    )
    .await;
    h.engine
        .chat(ChatRequest::new(vec![ChatTurn::user("Tell me about ID: jwl-outdoor-018")]).with_conversation("c-stage"))
        .await
        .unwrap();
    h.engine
        .chat(ChatRequest::new(vec![ChatTurn::user("yes, send it")]).with_conversation("c-stage"))
        .await
        .unwrap();

    let state = h.engine.store().peek("c-stage").unwrap();
    assert_eq!(state.active_product.unwrap().id, BACKPACK_ID);
    let system = &h.provider.requests().await[1].messages[0].content;
    assert!(!system.contains("[Current Focus Product]"));
    assert!(!system.contains("[Product Context]"));
}
