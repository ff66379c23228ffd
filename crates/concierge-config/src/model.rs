// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Concierge chat engine.
//!
//! Every section denies unknown fields, so a misspelled key stops startup
//! with a suggestion instead of being silently ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level Concierge configuration.
///
/// Every section may be omitted; an empty file is a working configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConciergeConfig {
    /// Engine identity and per-turn limits.
    #[serde(default)]
    pub engine: EngineConfig,

    /// LLM completion provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Conversation store and slot extraction settings.
    #[serde(default)]
    pub state: StateConfig,

    /// Vector index backend selection.
    #[serde(default)]
    pub index: IndexConfig,

    /// Retrieval tuning and overrides.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Intent routing and retrieval budgeting.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Prompt texts keyed by model key, then locale.
    #[serde(default = "default_prompts")]
    pub prompts: BTreeMap<String, BTreeMap<String, PromptConfig>>,

    /// Per-tool overrides merged over the built-in tool catalog.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolOverride>,

    /// User-facing tool messages keyed by locale, then message key.
    #[serde(default)]
    pub tool_responses: BTreeMap<String, BTreeMap<String, String>>,

    /// Inquiry delivery settings.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Catalog and knowledge-base data locations.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Engine identity and per-turn limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Display name used in logs.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Substituted for `{company}` in role prompts.
    #[serde(default = "default_company_name")]
    pub company_name: String,

    /// Level for `concierge*` targets when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Hard bound on model calls per request.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Number of recent turns replayed to the model.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Character budget for the conversation summary (tail-preserving).
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,

    /// Number of recent user turns that form the retrieval query.
    #[serde(default = "default_rag_query_turns")]
    pub rag_query_turns: usize,

    /// Character budget for the retrieval query (tail-preserving).
    #[serde(default = "default_rag_query_max_chars")]
    pub rag_query_max_chars: usize,

    /// Sampling temperature passed to the provider.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Truncation limit for tool output fed back to the model.
    #[serde(default = "default_tool_output_max_chars")]
    pub tool_output_max_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            company_name: default_company_name(),
            log_level: default_log_level(),
            max_turns: default_max_turns(),
            history_turns: default_history_turns(),
            summary_max_chars: default_summary_max_chars(),
            rag_query_turns: default_rag_query_turns(),
            rag_query_max_chars: default_rag_query_max_chars(),
            temperature: default_temperature(),
            tool_output_max_chars: default_tool_output_max_chars(),
        }
    }
}

fn default_engine_name() -> String {
    "concierge".to_string()
}

fn default_company_name() -> String {
    "our company".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_turns() -> usize {
    2
}

fn default_history_turns() -> usize {
    12
}

fn default_summary_max_chars() -> usize {
    900
}

fn default_rag_query_turns() -> usize {
    3
}

fn default_rag_query_max_chars() -> usize {
    900
}

fn default_temperature() -> f32 {
    0.6
}

fn default_tool_output_max_chars() -> usize {
    6000
}

/// LLM completion provider configuration (OpenAI-compatible).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// API key. `None` requires the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the Chat Completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Completion token cap for each model call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Explicit prompt set to use instead of matching on the model name.
    #[serde(default)]
    pub model_type: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            model_type: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

/// Embedding provider configuration (OpenAI-compatible).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// API key. Falls back to `llm.api_key`, then `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the embeddings API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model identifier.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Number of texts per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_embedding_model(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_batch_size() -> usize {
    64
}

/// Where inquiries and cached embeddings are kept.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite file, created with its parent directories on first start.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Open the file in write-ahead-log journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("concierge").join("concierge.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("concierge.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Conversation store and slot extraction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// Maximum number of live conversations before LRU eviction.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Seconds of inactivity after which a conversation expires.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Number of turns retained per conversation.
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    /// Slot name that carries the send-confirmation flag and names the confirmation stage.
    #[serde(default = "default_confirmation_slot")]
    pub confirmation_slot: String,

    /// Strong confirmation phrases keyed by locale. Replaces the built-in list when set.
    #[serde(default)]
    pub confirm_keywords_strong: Option<BTreeMap<String, Vec<String>>>,

    /// Weak confirmation phrases keyed by locale. Replaces the built-in list when set.
    #[serde(default)]
    pub confirm_keywords_weak: Option<BTreeMap<String, Vec<String>>>,

    /// Phrases that close a topic and clear the confirmation flag.
    #[serde(default = "default_closure_keywords")]
    pub closure_keywords: Vec<String>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            ttl_secs: default_ttl_secs(),
            recent_turns: default_recent_turns(),
            confirmation_slot: default_confirmation_slot(),
            confirm_keywords_strong: None,
            confirm_keywords_weak: None,
            closure_keywords: default_closure_keywords(),
        }
    }
}

fn default_max_items() -> usize {
    2000
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_recent_turns() -> usize {
    20
}

fn default_confirmation_slot() -> String {
    "confirm_send".to_string()
}

fn default_closure_keywords() -> Vec<String> {
    ["thank you", "thanks", "done", "finished", "bye", "谢谢", "再见"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Nearest-neighbor backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Raw vectors with precomputed norms; cosine computed per query.
    #[default]
    Exact,
    /// Vectors normalized at build time; inner product per query.
    Normalized,
}

/// Vector index configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Backend used for both the product and the knowledge index.
    #[serde(default)]
    pub backend: IndexBackend,
}

/// Retrieval tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Minimum normalized similarity for a fuzzy name match to count as exact.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Description truncation in product context blocks.
    #[serde(default = "default_desc_max_len")]
    pub desc_max_len: usize,

    /// KB oversampling factor before locale filtering.
    #[serde(default = "default_kb_oversample")]
    pub kb_oversample: usize,

    /// Upper bound on the KB oversampled candidate count.
    #[serde(default = "default_kb_oversample_cap")]
    pub kb_oversample_cap: usize,

    /// Weight of the semantic similarity in the `product_search` tool's
    /// hybrid score: `lexical + exact_boost + alpha * similarity * 100`.
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,

    /// Hybrid score a semantic-only `product_search` hit must exceed to be
    /// returned. Hits with any keyword or identifier match are always kept.
    #[serde(default = "default_hybrid_semantic_floor")]
    pub hybrid_semantic_floor: f64,

    /// Budget overrides applied when the conversation is in a given stage.
    #[serde(default)]
    pub on_stage: BTreeMap<String, BudgetOverride>,

    /// Budget overrides applied after product retrieval reports a given mode.
    #[serde(default)]
    pub on_rag_mode: BTreeMap<String, RagModeOverride>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            desc_max_len: default_desc_max_len(),
            kb_oversample: default_kb_oversample(),
            kb_oversample_cap: default_kb_oversample_cap(),
            hybrid_alpha: default_hybrid_alpha(),
            hybrid_semantic_floor: default_hybrid_semantic_floor(),
            on_stage: BTreeMap::new(),
            on_rag_mode: BTreeMap::new(),
        }
    }
}

fn default_hybrid_alpha() -> f64 {
    0.35
}

fn default_hybrid_semantic_floor() -> f64 {
    20.0
}

fn default_fuzzy_threshold() -> f64 {
    0.84
}

fn default_desc_max_len() -> usize {
    300
}

fn default_kb_oversample() -> usize {
    6
}

fn default_kb_oversample_cap() -> usize {
    60
}

/// Partial retrieval budget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetOverride {
    /// Replaces the planned product budget when set.
    #[serde(default)]
    pub product_k: Option<usize>,
    /// Replaces the planned knowledge budget when set.
    #[serde(default)]
    pub kb_k: Option<usize>,
}

/// Budget override keyed on the product retrieval mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RagModeOverride {
    /// Route flags (`is_broad`, `is_tech`) that suppress this override.
    #[serde(default)]
    pub unless_flags: Vec<String>,
    /// Replaces the planned product budget when set.
    #[serde(default)]
    pub product_k: Option<usize>,
    /// Replaces the planned knowledge budget when set.
    #[serde(default)]
    pub kb_k: Option<usize>,
}

/// How the route planner decides the intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingStrategy {
    /// Router first, keyword heuristics as fallback.
    #[default]
    Keyword,
    /// Router only.
    Embedding,
}

/// Retrieval budget pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Budget {
    /// Product hits to retrieve.
    pub product: usize,
    /// Knowledge chunks to retrieve.
    pub kb: usize,
}

/// Retrieval budgets per route profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Allocations {
    /// Budget for a turn that is neither broad nor technical.
    #[serde(default = "default_allocation")]
    pub default: Budget,
    /// Budget for catalog-wide browsing.
    #[serde(default = "broad_allocation")]
    pub broad: Budget,
    /// Budget for technical questions. Broad wins when a turn is both.
    #[serde(default = "tech_allocation")]
    pub tech: Budget,
}

impl Default for Allocations {
    fn default() -> Self {
        Self {
            default: default_allocation(),
            broad: broad_allocation(),
            tech: tech_allocation(),
        }
    }
}

fn default_allocation() -> Budget {
    Budget { product: 3, kb: 3 }
}

fn broad_allocation() -> Budget {
    Budget { product: 3, kb: 1 }
}

fn tech_allocation() -> Budget {
    Budget { product: 2, kb: 3 }
}

/// One routable intent and its example utterances.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntentConfig {
    /// Utterances whose embedding centroid represents the intent.
    #[serde(default)]
    pub examples: Vec<String>,
    /// Routing here selects the broad allocation.
    #[serde(default)]
    pub is_broad: bool,
    /// Routing here selects the tech allocation.
    #[serde(default)]
    pub is_tech: bool,
}

/// Intent routing and retrieval budgeting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Whether keyword heuristics back up the router.
    #[serde(default)]
    pub strategy: RoutingStrategy,

    /// Router results scoring below this are discarded.
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Downgradeable intents scoring below this become `general`.
    #[serde(default = "default_low_score_threshold")]
    pub low_score_threshold: f32,

    /// Intents subject to `low_score_threshold`.
    #[serde(default)]
    pub downgrade_intents: Vec<String>,

    /// Intents that never retrieve.
    #[serde(default = "default_no_rag_intents")]
    pub no_rag_intents: Vec<String>,

    /// Queries shorter than this many characters may count as short follow-ups.
    #[serde(default = "default_short_query_max_len")]
    pub short_query_max_len: usize,

    /// A short query containing one of these skips retrieval (keyword strategy only).
    #[serde(default = "default_short_query_keywords")]
    pub short_query_keywords: Vec<String>,

    /// Substrings (or regexes when containing `\` or `[`) marking technical questions.
    #[serde(default = "default_technical_keywords")]
    pub technical_keywords: Vec<String>,

    /// Substrings (or regexes) marking broad catalog questions.
    #[serde(default = "default_broad_keywords")]
    pub broad_keywords: Vec<String>,

    /// Retrieval budgets per route profile.
    #[serde(default)]
    pub allocations: Allocations,

    /// Routable intents keyed by name. Empty disables the router.
    #[serde(default)]
    pub intents: BTreeMap<String, IntentConfig>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::default(),
            min_score: default_min_score(),
            low_score_threshold: default_low_score_threshold(),
            downgrade_intents: Vec::new(),
            no_rag_intents: default_no_rag_intents(),
            short_query_max_len: default_short_query_max_len(),
            short_query_keywords: default_short_query_keywords(),
            technical_keywords: default_technical_keywords(),
            broad_keywords: default_broad_keywords(),
            allocations: Allocations::default(),
            intents: BTreeMap::new(),
        }
    }
}

fn default_min_score() -> f32 {
    0.25
}

fn default_low_score_threshold() -> f32 {
    0.45
}

fn default_no_rag_intents() -> Vec<String> {
    vec!["chitchat".to_string()]
}

fn default_short_query_max_len() -> usize {
    15
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_short_query_keywords() -> Vec<String> {
    strings(&["yes", "ok", "okay", "sure", "thanks", "thank you", "send", "confirm", "hi", "hello"])
}

fn default_technical_keywords() -> Vec<String> {
    strings(&[
        "material",
        "fabric",
        "spec",
        "size",
        "dimension",
        "capacity",
        "weight",
        "waterproof",
        "moq",
        "lead time",
        "price",
        "shipping",
        "warranty",
        "材料",
        "尺寸",
        "价格",
    ])
}

fn default_broad_keywords() -> Vec<String> {
    strings(&[
        "recommend",
        "catalog",
        "what products",
        "what do you sell",
        "options",
        "collection",
        "range of",
        "推荐",
        "有哪些",
    ])
}

/// Prompt sections for one model key and locale.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    /// Role description. `{company}` is replaced with `engine.company_name`.
    #[serde(default)]
    pub role: String,
    /// Grounding rules; the model must not go beyond the supplied context.
    #[serde(default)]
    pub strict_policy: String,
    /// Tone and conversation conduct.
    #[serde(default)]
    pub general_rules: String,
    /// Format and language of the reply.
    #[serde(default)]
    pub output_req: String,
}

fn default_prompts() -> BTreeMap<String, BTreeMap<String, PromptConfig>> {
    let en = PromptConfig {
        role: "You are the sales assistant of {company}. Help customers find products and send inquiries.".into(),
        strict_policy: "Only state product facts that appear in the provided context. Cite product id or slug when recommending.".into(),
        general_rules: "Be concise and friendly. Ask for missing contact details one at a time.".into(),
        output_req: "Reply in plain text in the customer's language.".into(),
    };
    let zh = PromptConfig {
        role: "你是{company}的销售助理，帮助客户查找产品并发送询盘。".into(),
        strict_policy: "只陈述上下文中出现的产品信息。推荐时请引用产品 id 或 slug。".into(),
        general_rules: "简洁友好。缺少联系方式时一次只询问一项。".into(),
        output_req: "使用客户的语言以纯文本回复。".into(),
    };
    let mut locales = BTreeMap::new();
    locales.insert("en".to_string(), en);
    locales.insert("zh".to_string(), zh);
    let mut prompts = BTreeMap::new();
    prompts.insert("default".to_string(), locales);
    prompts
}

/// Partial tool definition merged field-by-field over the built-in catalog.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolOverride {
    /// Localized description keyed by locale.
    #[serde(default)]
    pub description: Option<BTreeMap<String, String>>,

    /// JSON schema for the tool arguments.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,

    /// Slots that must be filled before the tool may run.
    #[serde(default)]
    pub required_slots: Option<Vec<String>>,

    /// Intents for which the tool is offered. Empty means always.
    #[serde(default)]
    pub intents: Option<Vec<String>>,

    /// `false` removes the tool from every turn.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// The tool only runs once the user has confirmed it.
    #[serde(default)]
    pub confirmation_required: Option<bool>,

    /// Handler key. Must name a built-in handler.
    #[serde(default)]
    pub handler: Option<String>,

    /// Localized policy text appended to the system prompt while the tool is offered.
    #[serde(default)]
    pub policy: Option<BTreeMap<String, String>>,
}

/// Inquiry delivery over SMTP.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    /// SMTP relay host. `None` leaves delivery unconfigured.
    #[serde(default)]
    pub smtp_host: Option<String>,

    /// SMTP submission port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// SMTP login. Authentication is skipped when unset.
    #[serde(default)]
    pub username: Option<String>,

    /// SMTP password, used with `username`.
    #[serde(default)]
    pub password: Option<String>,

    /// Sender address.
    #[serde(default)]
    pub from: Option<String>,

    /// Sales inbox receiving inquiries.
    #[serde(default)]
    pub to: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from: None,
            to: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

/// Catalog and knowledge-base data locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// JSON array of catalog items.
    #[serde(default = "default_products_path")]
    pub products_path: String,

    /// Directory of `*.jsonl` knowledge chunks.
    #[serde(default = "default_kb_dir")]
    pub kb_dir: String,

    /// Site information JSON used for `{{KEY}}` templating in KB chunks.
    #[serde(default)]
    pub site_info_path: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            products_path: default_products_path(),
            kb_dir: default_kb_dir(),
            site_info_path: None,
        }
    }
}

fn default_products_path() -> String {
    "data/products.json".to_string()
}

fn default_kb_dir() -> String {
    "data/kb".to_string()
}
