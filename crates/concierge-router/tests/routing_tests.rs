// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use concierge_config::load_config_from_str;
use concierge_router::{GENERAL_INTENT, IntentRouter, RoutePlanner};
use concierge_test_utils::MockEmbedder;

const CONFIG: &str = r#"
[routing]
strategy = "keyword"
downgrade_intents = ["catalog_browse"]

[routing.intents.catalog_browse]
examples = ["what products do you sell", "show me your bag catalog"]
is_broad = true

[routing.intents.chitchat]
examples = ["hello how are you", "good morning friend"]

[retrieval.on_stage.confirm_send]
product_k = 0
kb_k = 0
"#;

#[tokio::test]
async fn router_verdict_feeds_planner() {
    let config = load_config_from_str(CONFIG).unwrap();
    let router = IntentRouter::new(Arc::new(MockEmbedder::new(256)), config.routing.min_score, 16);
    router.build(&config.routing.intents).await.unwrap();
    let planner = RoutePlanner::from_config(&config);

    let query = "what products do you sell in your bag catalog";
    let decision = planner.plan(query, router.route(query).await.unwrap(), None);
    assert_eq!(decision.intent, "catalog_browse");
    assert!(decision.is_broad);
    assert_eq!((decision.product_k, decision.kb_k), (3, 1));

    let query = "hello how are you doing today";
    let decision = planner.plan(query, router.route(query).await.unwrap(), Some("confirm_send"));
    assert_eq!(decision.intent, "chitchat");
    assert_eq!(decision.stage, None);
    assert_eq!((decision.product_k, decision.kb_k), (0, 0));
}

#[tokio::test]
async fn unrouted_query_falls_back_to_keywords() {
    let config = load_config_from_str(CONFIG).unwrap();
    let router = IntentRouter::new(Arc::new(MockEmbedder::new(256)), config.routing.min_score, 16);
    router.build(&config.routing.intents).await.unwrap();
    let planner = RoutePlanner::from_config(&config);

    let query = "is it waterproof";
    let decision = planner.plan(query, router.route(query).await.unwrap(), None);
    assert_eq!(decision.intent, GENERAL_INTENT);
    assert!(decision.is_tech);
    assert_eq!((decision.product_k, decision.kb_k), (2, 3));
}

#[tokio::test]
async fn confirmation_stage_shrinks_budget() {
    let config = load_config_from_str(CONFIG).unwrap();
    let planner = RoutePlanner::from_config(&config);
    let decision = planner.plan("what is the lead time for this", None, Some("confirm_send"));
    assert!(decision.is_tech);
    assert!(decision.in_stage("confirm_send"));
    assert_eq!((decision.product_k, decision.kb_k), (0, 0));
}
