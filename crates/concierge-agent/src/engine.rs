// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request orchestration: state, routing, retrieval, prompt, loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use concierge_config::ConciergeConfig;
use concierge_config::model::{CatalogConfig, IntentConfig};
use concierge_context::{AssembledPrompt, PromptAssembler, PromptInput, rag_query};
use concierge_core::{
    ConciergeError, EmbeddingAdapter, Notifier, ProviderAdapter, StorageAdapter,
};
use concierge_index::EmbeddingCache;
use concierge_retrieval::{
    Catalog, HybridWeights, KbRetriever, ProductHits, ProductRetriever, RetrievalMode,
    render_hits,
};
use concierge_router::{IntentRouter, RouteDecision, RoutePlanner};
use concierge_state::{ConversationState, ConversationStore, PinnedEntity, Slots, StateUpdater, slot};
use concierge_tools::{DispatchContext, HandlerKind, ToolDispatcher, ToolRegistry, builtin_handlers};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::{AgentLoop, LoopEnd, LoopInput, LoopReport};
use crate::events::{ChatEvent, ChatRequest, ChatResponse};
use crate::outcome::OutcomeProcessor;
use crate::responses::ToolResponses;

/// Capacity of the per-request event channel.
const EVENT_BUFFER: usize = 64;

/// External collaborators of the engine.
#[derive(Clone)]
pub struct EngineServices {
    pub provider: Arc<dyn ProviderAdapter>,
    pub embedder: Arc<dyn EmbeddingAdapter>,
    pub storage: Arc<dyn StorageAdapter>,
    /// `None` when no mailer is configured.
    pub notifier: Option<Arc<dyn Notifier>>,
}

/// Index sizes after a warm-up or rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmUpReport {
    pub products: usize,
    pub chunks: usize,
    pub intents: usize,
}

/// Everything computed before the first model call of a request.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub locale: String,
    pub conversation_id: Option<String>,
    pub query: String,
    pub decision: RouteDecision,
    pub mode: RetrievalMode,
    pub prompt: AssembledPrompt,
    /// Tool descriptors offered to the model.
    pub tools: Vec<Value>,
    pub slots: Option<Slots>,
    pub pinned: Option<PinnedEntity>,
    /// Known customer name, announced before streaming output.
    pub user_name: Option<String>,
}

impl PreparedTurn {
    fn loop_input(&self, allow_actions: bool) -> LoopInput {
        LoopInput {
            messages: self.prompt.messages.clone(),
            tools: self.tools.clone(),
            dispatch: DispatchContext::new(self.locale.clone()).with_pinned(self.pinned.clone()),
            slots: self.slots.clone(),
            allow_actions,
        }
    }
}

pub struct ChatEngine {
    catalog: CatalogConfig,
    intents: BTreeMap<String, IntentConfig>,
    rag_query_turns: usize,
    rag_query_max_chars: usize,
    desc_max_len: usize,
    products: Arc<ProductRetriever>,
    kb: KbRetriever,
    router: IntentRouter,
    planner: RoutePlanner,
    registry: Arc<ToolRegistry>,
    assembler: PromptAssembler,
    agent: AgentLoop,
    store: ConversationStore,
    updater: StateUpdater,
}

impl ChatEngine {
    pub fn new(config: &ConciergeConfig, services: EngineServices) -> Self {
        let batch = config.embedding.batch_size;
        let cache = Arc::new(EmbeddingCache::new(
            services.storage.clone(),
            services.embedder.clone(),
            batch,
        ));
        let products = Arc::new(
            ProductRetriever::new(
                cache.clone(),
                config.index.backend,
                config.retrieval.fuzzy_threshold,
            )
            .with_hybrid(HybridWeights {
                alpha: config.retrieval.hybrid_alpha,
                semantic_floor: config.retrieval.hybrid_semantic_floor,
            }),
        );
        let kb = KbRetriever::new(
            cache,
            config.index.backend,
            config.retrieval.kb_oversample,
            config.retrieval.kb_oversample_cap,
        );
        let router = IntentRouter::new(services.embedder.clone(), config.routing.min_score, batch);
        let registry = Arc::new(ToolRegistry::from_config(config));
        let dispatcher = Arc::new(ToolDispatcher::new(registry.clone()).with_handlers(builtin_handlers(
            products.clone(),
            services.storage.clone(),
            services.notifier.clone(),
        )));
        let processor = Arc::new(OutcomeProcessor::new(
            dispatcher,
            ToolResponses::from_config(config),
            config.engine.tool_output_max_chars,
        ));

        Self {
            catalog: config.catalog.clone(),
            intents: config.routing.intents.clone(),
            rag_query_turns: config.engine.rag_query_turns,
            rag_query_max_chars: config.engine.rag_query_max_chars,
            desc_max_len: config.retrieval.desc_max_len,
            products,
            kb,
            router,
            planner: RoutePlanner::from_config(config),
            registry,
            assembler: PromptAssembler::from_config(config),
            agent: AgentLoop::from_config(config, services.provider, processor),
            store: ConversationStore::from_config(&config.state),
            updater: StateUpdater::new(&config.state, config.engine.summary_max_chars),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn products(&self) -> &Arc<ProductRetriever> {
        &self.products
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Load the configured catalog and build every index.
    ///
    /// Failures leave the affected index empty and are logged; the engine
    /// still answers, only without that grounding.
    pub async fn warm_up(&self) -> WarmUpReport {
        let catalog = Catalog::load(&self.catalog);
        self.rebuild(catalog).await
    }

    /// Build fresh indices from `catalog` and swap them in.
    pub async fn rebuild(&self, catalog: Catalog) -> WarmUpReport {
        let mut report = WarmUpReport::default();
        let Catalog { products, chunks } = catalog;

        let product_count = products.len();
        self.products.set_items(products.clone());
        match self.products.rebuild(products).await {
            Ok(r) => report.products = r.items,
            Err(e) => {
                warn!(error = %e, "product index unavailable, exact matching only");
                report.products = product_count;
            }
        }
        match self.kb.rebuild(chunks).await {
            Ok(r) => report.chunks = r.items,
            Err(e) => warn!(error = %e, "kb index unavailable"),
        }
        match self.router.build(&self.intents).await {
            Ok(n) => report.intents = n,
            Err(e) => warn!(error = %e, "intent router unavailable, falling back to keywords"),
        }
        info!(
            products = report.products,
            chunks = report.chunks,
            intents = report.intents,
            "indices ready"
        );
        report
    }

    /// Fill in a pinned entity's slug from the catalog.
    fn resolve_pin(&self, state: &mut ConversationState) {
        let Some(pinned) = &state.active_product else {
            return;
        };
        if !pinned.slug.is_empty() {
            return;
        }
        if let Some(item) = self.products.get(&pinned.id) {
            state.pin(PinnedEntity::new(item.id, item.slug));
        }
    }

    async fn retrieve_products(
        &self,
        query: &str,
        locale: &str,
        decision: &RouteDecision,
        focus: Option<&str>,
    ) -> ProductHits {
        match self
            .products
            .retrieve_focused(query, locale, decision.product_k, focus, decision.is_broad)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "product retrieval failed");
                ProductHits::skipped()
            }
        }
    }

    /// State update, routing, retrieval, tool selection and prompt assembly.
    pub async fn prepare(&self, request: &ChatRequest) -> PreparedTurn {
        let locale = request.locale().to_string();
        let conf_slot = self.updater.confirmation_slot().to_string();

        let mut state = request.conversation_id().map(|id| {
            let current = self.store.get_or_create(id, &locale);
            let mut updated = self.updater.apply(current, &request.messages);
            self.resolve_pin(&mut updated);
            updated
        });

        let query = rag_query(&request.messages, self.rag_query_turns, self.rag_query_max_chars);
        let routed = match self.router.route(&query).await {
            Ok(routed) => routed,
            Err(e) => {
                warn!(error = %e, "intent routing failed");
                None
            }
        };
        let stage = state.as_ref().and_then(|s| s.stage(&conf_slot));
        let mut decision = self.planner.plan(&query, routed, stage.as_deref());

        let focus = state
            .as_ref()
            .and_then(|s| s.active_product.as_ref())
            .map(|p| p.id.clone());
        let hits = self
            .retrieve_products(&query, &locale, &decision, focus.as_deref())
            .await;
        if let (Some(state), Some(item)) = (state.as_mut(), hits.focus()) {
            state.pin(PinnedEntity::new(item.id.clone(), item.slug.clone()));
        }
        self.planner.apply_rag_mode(&mut decision, &hits.mode.to_string());

        let kb_hits = match self.kb.retrieve(&query, &locale, decision.kb_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "kb retrieval failed");
                Vec::new()
            }
        };
        let kb_context = render_hits(&kb_hits);
        let product_context = hits.render(&locale, self.desc_max_len);

        let no_slots = Slots::default();
        let slots = state.as_ref().map(|s| &s.slots);
        let allowed = self.registry.allowed(&decision, slots.unwrap_or(&no_slots));
        let tools: Vec<Value> = allowed.iter().map(|spec| spec.descriptor(&locale)).collect();
        let policies: Vec<String> = allowed
            .iter()
            .map(|spec| spec.policy_for(&locale).to_string())
            .collect();

        let summary = state.as_ref().map(|s| s.summary.as_str()).unwrap_or_default();
        let prompt = self.assembler.assemble(&PromptInput {
            model: self.agent.model(),
            locale: &locale,
            summary,
            slots,
            kb_context: &kb_context,
            product_context: &product_context,
            policies: &policies,
            turns: &request.messages,
        });

        info!(
            conversation_id = ?request.conversation_id(),
            intent = %decision.intent,
            score = decision.score,
            stage = ?decision.stage,
            product_k = decision.product_k,
            kb_k = decision.kb_k,
            mode = %hits.mode,
            product_hits = hits.items.len(),
            kb_hits = kb_hits.len(),
            tools = tools.len(),
            "turn prepared"
        );

        let prepared = PreparedTurn {
            locale,
            conversation_id: request.conversation_id().map(str::to_string),
            query,
            decision,
            mode: hits.mode,
            prompt,
            tools,
            slots: state.as_ref().map(|s| s.slots.clone()),
            pinned: state.as_ref().and_then(|s| s.active_product.clone()),
            user_name: state
                .as_ref()
                .and_then(|s| s.slots.get_str(slot::NAME))
                .map(str::to_string),
        };
        if let Some(state) = state {
            self.store.upsert(state);
        }
        prepared
    }

    /// Answer a request without streaming.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ConciergeError> {
        let prepared = self.prepare(&request).await;
        let report = self
            .agent
            .run_complete(prepared.loop_input(request.allow_actions))
            .await?;
        self.finish(&prepared, &report);
        Ok(ChatResponse {
            response: report.final_text,
            action: report.action,
            action_data: report.action_data,
        })
    }

    /// Answer a request as a stream of events on a background task.
    ///
    /// Dropping the receiver or cancelling `cancel` stops the task without
    /// further model calls.
    pub fn chat_stream(
        self: Arc<Self>,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ChatEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            self.stream_into(request, tx, cancel).await;
        });
        rx
    }

    /// Run a streaming request into `tx` on the current task.
    pub async fn stream_into(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<ChatEvent>,
        cancel: CancellationToken,
    ) -> LoopReport {
        let prepared = self.prepare(&request).await;

        if let Some(name) = &prepared.user_name
            && tx.send(ChatEvent::UserUpdate { name: name.clone() }).await.is_err()
        {
            debug!("client went away before streaming started");
            return LoopReport {
                end: LoopEnd::Cancelled,
                ..Default::default()
            };
        }

        let report = self
            .agent
            .run_stream(prepared.loop_input(request.allow_actions), &tx, &cancel)
            .await;
        if report.end == LoopEnd::Cancelled {
            info!(conversation_id = ?prepared.conversation_id, "stream cancelled");
        }
        self.finish(&prepared, &report);
        report
    }

    /// Fold a finished loop back into the conversation state.
    fn finish(&self, prepared: &PreparedTurn, report: &LoopReport) {
        let Some(id) = &prepared.conversation_id else {
            return;
        };
        let mut state = self.store.get_or_create(id, &prepared.locale);
        let conf_slot = self.updater.confirmation_slot().to_string();

        for outcome in report.outcomes.iter().filter(|o| o.success) {
            match outcome.handler {
                Some(HandlerKind::GetProductDetails) => {
                    let product = outcome.result.as_ref().and_then(|r| r.get("product"));
                    let id = product.and_then(|p| p.get("id")).and_then(Value::as_str);
                    let slug = product
                        .and_then(|p| p.get("slug"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    if let Some(id) = id {
                        debug!(conversation_id = %state.id, product_id = %id, "details lookup pins product");
                        state.pin(PinnedEntity::new(id, slug));
                    }
                }
                Some(HandlerKind::SendInquiry) => {
                    for key in [slot::NAME, slot::EMAIL] {
                        if let Some(value) = outcome
                            .arguments
                            .get(key)
                            .and_then(Value::as_str)
                            .map(str::trim)
                            .filter(|v| !v.is_empty())
                        {
                            state.slots.set(key, value);
                        }
                    }
                    state.slots.set(conf_slot.clone(), false);
                }
                _ => {}
            }
        }

        self.updater.record(&mut state, &report.transcript);
        self.store.upsert(state);
    }
}
