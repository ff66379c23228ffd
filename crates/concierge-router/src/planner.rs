// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-turn route planning: intent, retrieval budgets and stage.

use std::collections::BTreeMap;

use concierge_config::ConciergeConfig;
use concierge_config::model::{
    BudgetOverride, RagModeOverride, RetrievalConfig, RoutingConfig, RoutingStrategy,
};
use serde::Serialize;
use tracing::debug;

use crate::intent::IntentMatch;
use crate::keywords::KeywordSet;

/// Intent name used when nothing more specific applies.
pub const GENERAL_INTENT: &str = "general";
const CHITCHAT_INTENT: &str = "chitchat";

/// The per-turn routing verdict. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub intent: String,
    pub score: f32,
    pub product_k: usize,
    pub kb_k: usize,
    pub stage: Option<String>,
    pub is_broad: bool,
    pub is_tech: bool,
}

impl RouteDecision {
    /// Value of a named route flag (`is_broad`, `is_tech`).
    pub fn flag(&self, name: &str) -> bool {
        match name {
            "is_broad" => self.is_broad,
            "is_tech" => self.is_tech,
            _ => false,
        }
    }

    pub fn in_stage(&self, stage: &str) -> bool {
        self.stage.as_deref() == Some(stage)
    }
}

pub struct RoutePlanner {
    routing: RoutingConfig,
    on_stage: BTreeMap<String, BudgetOverride>,
    on_rag_mode: BTreeMap<String, RagModeOverride>,
    technical: KeywordSet,
    broad: KeywordSet,
    short_keywords: Vec<String>,
}

impl RoutePlanner {
    pub fn new(routing: &RoutingConfig, retrieval: &RetrievalConfig) -> Self {
        Self {
            technical: KeywordSet::new(&routing.technical_keywords),
            broad: KeywordSet::new(&routing.broad_keywords),
            short_keywords: routing
                .short_query_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            routing: routing.clone(),
            on_stage: retrieval.on_stage.clone(),
            on_rag_mode: retrieval.on_rag_mode.clone(),
        }
    }

    pub fn from_config(config: &ConciergeConfig) -> Self {
        Self::new(&config.routing, &config.retrieval)
    }

    pub fn strategy(&self) -> RoutingStrategy {
        self.routing.strategy
    }

    /// Plan a turn from the query, the router's verdict and the current stage.
    pub fn plan(
        &self,
        query: &str,
        routed: Option<IntentMatch>,
        stage: Option<&str>,
    ) -> RouteDecision {
        let query = query.trim();
        let mut stage = stage.filter(|s| !s.is_empty()).map(str::to_string);

        let (mut intent, score, mut is_broad, mut is_tech) = match (routed, self.routing.strategy) {
            (Some(m), _) => (m.intent, m.score, m.is_broad, m.is_tech),
            (None, RoutingStrategy::Embedding) => (GENERAL_INTENT.to_string(), 0.0, false, false),
            (None, RoutingStrategy::Keyword) => (
                GENERAL_INTENT.to_string(),
                0.0,
                self.broad.matches(query),
                self.technical.matches(query),
            ),
        };

        if score < self.routing.low_score_threshold
            && self.routing.downgrade_intents.contains(&intent)
        {
            debug!(intent = %intent, score, "low-confidence intent downgraded");
            intent = GENERAL_INTENT.to_string();
            is_broad = false;
            is_tech = false;
        }

        let allocations = &self.routing.allocations;
        let budget = if is_broad {
            allocations.broad
        } else if is_tech {
            allocations.tech
        } else {
            allocations.default
        };
        let (mut product_k, mut kb_k) = (budget.product, budget.kb);

        if self.routing.no_rag_intents.contains(&intent) {
            product_k = 0;
            kb_k = 0;
            if intent == CHITCHAT_INTENT {
                stage = None;
            }
        }

        if self.routing.strategy == RoutingStrategy::Keyword && self.is_short_action(query) {
            product_k = 0;
            kb_k = 0;
            is_broad = false;
            is_tech = false;
        }

        if intent == GENERAL_INTENT && !is_broad && !is_tech {
            product_k = 0;
            kb_k = 0;
        }

        if let Some(over) = stage.as_deref().and_then(|s| self.on_stage.get(s)) {
            product_k = over.product_k.unwrap_or(product_k);
            kb_k = over.kb_k.unwrap_or(kb_k);
        }

        RouteDecision {
            intent,
            score,
            product_k,
            kb_k,
            stage,
            is_broad,
            is_tech,
        }
    }

    /// Apply the override configured for a product retrieval mode, unless one
    /// of its `unless_flags` is set on the decision.
    pub fn apply_rag_mode(&self, decision: &mut RouteDecision, mode: &str) -> bool {
        let Some(over) = self.on_rag_mode.get(mode) else {
            return false;
        };
        if over.unless_flags.iter().any(|f| decision.flag(f)) {
            return false;
        }
        decision.product_k = over.product_k.unwrap_or(decision.product_k);
        decision.kb_k = over.kb_k.unwrap_or(decision.kb_k);
        true
    }

    fn is_short_action(&self, query: &str) -> bool {
        if query.chars().count() >= self.routing.short_query_max_len {
            return false;
        }
        let lowered = query.to_lowercase();
        self.short_keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_config::load_config_from_str;

    fn planner(toml: &str) -> RoutePlanner {
        let config = load_config_from_str(toml).unwrap();
        RoutePlanner::from_config(&config)
    }

    fn routed(intent: &str, score: f32, is_broad: bool, is_tech: bool) -> Option<IntentMatch> {
        Some(IntentMatch {
            intent: intent.into(),
            score,
            is_broad,
            is_tech,
        })
    }

    #[test]
    fn keyword_fallback_sets_flags_and_budgets() {
        let p = planner("");
        let d = p.plan("What is the capacity of the backpack?", None, None);
        assert_eq!(d.intent, GENERAL_INTENT);
        assert!(d.is_tech && !d.is_broad);
        assert_eq!((d.product_k, d.kb_k), (2, 3));

        let d = p.plan("Can you recommend a good gift option?", None, None);
        assert!(d.is_broad);
        assert_eq!((d.product_k, d.kb_k), (3, 1));
    }

    #[test]
    fn general_without_flags_retrieves_nothing() {
        let d = planner("").plan("tell me more about your company history", None, None);
        assert_eq!((d.product_k, d.kb_k), (0, 0));
    }

    #[test]
    fn routed_intent_uses_default_allocation() {
        let d = planner("").plan("I want a quote for bags", routed("quote", 0.8, false, false), None);
        assert_eq!(d.intent, "quote");
        assert_eq!((d.product_k, d.kb_k), (3, 3));
    }

    #[test]
    fn low_score_downgrade_clears_flags() {
        let p = planner("[routing]\ndowngrade_intents = [\"browse\"]\n");
        let d = p.plan("do you have something nice", routed("browse", 0.3, true, false), None);
        assert_eq!(d.intent, GENERAL_INTENT);
        assert!(!d.is_broad);
        assert_eq!((d.product_k, d.kb_k), (0, 0));

        let d = p.plan("do you have something nice", routed("browse", 0.6, true, false), None);
        assert_eq!(d.intent, "browse");
        assert_eq!((d.product_k, d.kb_k), (3, 1));
    }

    #[test]
    fn chitchat_zeroes_budgets_and_clears_stage() {
        let d = planner("").plan(
            "how is the weather over there today",
            routed("chitchat", 0.9, false, false),
            Some("confirm_send"),
        );
        assert_eq!((d.product_k, d.kb_k), (0, 0));
        assert_eq!(d.stage, None);
    }

    #[test]
    fn short_action_utterance_short_circuits() {
        let p = planner("");
        let d = p.plan("yes send it", routed("inquiry", 0.9, false, true), None);
        assert_eq!((d.product_k, d.kb_k), (0, 0));
        assert!(!d.is_tech);

        let long = p.plan("yes and what is the price for 500 pieces", None, None);
        assert!(long.is_tech);
        assert!(long.product_k > 0);
    }

    #[test]
    fn short_query_rule_only_for_keyword_strategy() {
        let p = planner("[routing]\nstrategy = \"embedding\"\n");
        let d = p.plan("ok price?", routed("pricing", 0.9, false, true), None);
        assert_eq!((d.product_k, d.kb_k), (2, 3));

        let d = p.plan("what is the price", None, None);
        assert_eq!(d.intent, GENERAL_INTENT);
        assert!(!d.is_tech);
        assert_eq!((d.product_k, d.kb_k), (0, 0));
    }

    #[test]
    fn stage_override_applies() {
        let p = planner(
            "[retrieval.on_stage.confirm_send]\nproduct_k = 0\nkb_k = 1\n",
        );
        let d = p.plan(
            "what is the price per unit for this",
            routed("pricing", 0.9, false, true),
            Some("confirm_send"),
        );
        assert!(d.in_stage("confirm_send"));
        assert_eq!((d.product_k, d.kb_k), (0, 1));
    }

    #[test]
    fn rag_mode_override_respects_unless_flags() {
        let p = planner(
            "[retrieval.on_rag_mode.context_lock]\nunless_flags = [\"is_tech\"]\nkb_k = 0\n",
        );
        let mut plain = p.plan("do you have it in blue color", routed("product", 0.9, false, false), None);
        assert!(p.apply_rag_mode(&mut plain, "context_lock"));
        assert_eq!(plain.kb_k, 0);
        assert_eq!(plain.product_k, 3);

        let mut tech = p.plan("what is the material exactly", routed("product", 0.9, false, true), None);
        assert!(!p.apply_rag_mode(&mut tech, "context_lock"));
        assert_eq!(tech.kb_k, 3);
        assert!(!p.apply_rag_mode(&mut tech, "rag"));
    }
}
