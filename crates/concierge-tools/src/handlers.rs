// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tool handlers.

use std::sync::Arc;

use async_trait::async_trait;
use concierge_core::{ConciergeError, NewInquiry, Notifier, StorageAdapter};
use concierge_retrieval::{CatalogItem, HybridHit, ProductRetriever};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::dispatcher::{DispatchContext, ToolHandler};
use crate::spec::HandlerKind;

fn parse<T: DeserializeOwned>(args: Value) -> Result<T, ConciergeError> {
    serde_json::from_value(args).map_err(|e| ConciergeError::Validation(e.to_string()))
}

/// `get_product_details`: the full catalog record for one id.
pub struct ProductDetailsHandler {
    products: Arc<ProductRetriever>,
}

impl ProductDetailsHandler {
    pub fn new(products: Arc<ProductRetriever>) -> Self {
        Self { products }
    }
}

#[derive(Deserialize)]
struct DetailsArgs {
    product_id: String,
}

#[async_trait]
impl ToolHandler for ProductDetailsHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::GetProductDetails
    }

    async fn invoke(&self, args: Value, _ctx: &DispatchContext) -> Result<Value, ConciergeError> {
        let args: DetailsArgs = parse(args)?;
        match self.products.get(&args.product_id) {
            Some(item) => Ok(json!({"ok": true, "product": item})),
            None => {
                info!(product_id = %args.product_id, "product details not found");
                Ok(json!({"ok": false, "error": "not_found"}))
            }
        }
    }
}

/// `product_search`: hybrid keyword and semantic catalog search.
pub struct ProductSearchHandler {
    products: Arc<ProductRetriever>,
}

impl ProductSearchHandler {
    pub fn new(products: Arc<ProductRetriever>) -> Self {
        Self { products }
    }
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    5
}

/// Longest description returned per search result.
const RESULT_DESC_CHARS: usize = 220;

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn search_result(hit: &HybridHit, locale: &str) -> Value {
    let item = &hit.item;
    let mut result = json!({
        "id": item.id,
        "slug": item.slug,
        "category": item.category,
        "tags": item.tags,
        "name": item.name(locale),
        "description": item.description(locale).chars().take(RESULT_DESC_CHARS).collect::<String>(),
        "score": round_to(hit.score, 3),
        "lex_score": hit.lex_score,
        "exact_boost": hit.exact_boost,
        "semantic_score": round_to(f64::from(hit.semantic_score), 6),
    });
    if let Some(dir) = item.extra.get("assetDir").and_then(Value::as_str) {
        result["assetDir"] = json!(dir);
        result["image"] = json!(format!("/images/products/{dir}/1_thumb.webp"));
    }
    result
}

#[async_trait]
impl ToolHandler for ProductSearchHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::ProductSearch
    }

    async fn invoke(&self, args: Value, ctx: &DispatchContext) -> Result<Value, ConciergeError> {
        let args: SearchArgs = parse(args)?;
        let hits = self
            .products
            .hybrid_search(&args.query, &ctx.locale, args.limit)
            .await;
        let results: Vec<Value> = hits.iter().map(|hit| search_result(hit, &ctx.locale)).collect();
        info!(query = %args.query, limit = args.limit, results = results.len(), "product search");
        Ok(json!({"ok": true, "query": args.query, "results": results}))
    }
}

/// `send_inquiry`: persist the inquiry, then hand it to the notifier.
///
/// The record is written before any delivery attempt, so a delivery
/// failure leaves a `failed` row rather than losing the inquiry.
pub struct SendInquiryHandler {
    storage: Arc<dyn StorageAdapter>,
    notifier: Option<Arc<dyn Notifier>>,
    products: Option<Arc<ProductRetriever>>,
}

impl SendInquiryHandler {
    pub fn new(storage: Arc<dyn StorageAdapter>, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self {
            storage,
            notifier,
            products: None,
        }
    }

    /// Resolve product names for the context block appended to the message.
    pub fn with_products(mut self, products: Arc<ProductRetriever>) -> Self {
        self.products = Some(products);
        self
    }

    fn resolve(&self, key: &str) -> Option<CatalogItem> {
        self.products.as_ref().and_then(|p| p.get(key))
    }
}

#[derive(Deserialize)]
struct InquiryArgs {
    name: String,
    email: String,
    message: String,
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    product_slug: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn with_product_context(message: &str, id: Option<&str>, slug: Option<&str>, name: Option<&str>) -> String {
    if id.is_none() && slug.is_none() {
        return message.to_string();
    }
    let mut out = format!("{message}\n\n--- Product Context ---");
    if let Some(id) = id {
        out.push_str(&format!("\nProduct ID: {id}"));
    }
    if let Some(slug) = slug {
        out.push_str(&format!("\nProduct Slug: {slug}"));
    }
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        out.push_str(&format!("\nProduct Name: {name}"));
    }
    out
}

#[async_trait]
impl ToolHandler for SendInquiryHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::SendInquiry
    }

    async fn invoke(&self, args: Value, ctx: &DispatchContext) -> Result<Value, ConciergeError> {
        let args: InquiryArgs = parse(args)?;
        let product_id = non_empty(args.product_id);
        let mut product_slug = non_empty(args.product_slug);
        let item = product_id
            .as_deref()
            .or(product_slug.as_deref())
            .and_then(|key| self.resolve(key));
        if product_slug.is_none() {
            product_slug = item.as_ref().map(|i| i.slug.clone()).filter(|s| !s.is_empty());
        }
        let product_name = item.as_ref().map(|i| i.name(&ctx.locale));

        let message = with_product_context(
            &args.message,
            product_id.as_deref(),
            product_slug.as_deref(),
            product_name.as_deref(),
        );
        let inquiry = NewInquiry {
            name: args.name.trim().to_string(),
            email: args.email.trim().to_string(),
            message,
            product_id,
            product_slug,
            source: ctx.source.clone(),
            meta: Some(json!({"locale": ctx.locale})),
        };

        let inquiry_id = match self.storage.insert_inquiry(&inquiry).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "inquiry insert failed");
                return Ok(json!({"ok": false, "error": "Database error"}));
            }
        };
        info!(inquiry_id = %inquiry_id, product_id = ?inquiry.product_id, "inquiry saved");

        let Some(notifier) = &self.notifier else {
            warn!(inquiry_id = %inquiry_id, "mailer not configured, inquiry stored only");
            return Ok(json!({"ok": true, "inquiry_id": inquiry_id, "note": "Mailer not configured"}));
        };

        match notifier
            .send(&inquiry.name, &inquiry.email, &inquiry.message)
            .await
        {
            Ok(delivery_id) => {
                if let Err(e) = self.storage.mark_inquiry_sent(&inquiry_id, &delivery_id).await {
                    warn!(inquiry_id = %inquiry_id, error = %e, "could not mark inquiry sent");
                }
                info!(inquiry_id = %inquiry_id, delivery_id = %delivery_id, "inquiry delivered");
                Ok(json!({"ok": true, "inquiry_id": inquiry_id, "delivery_id": delivery_id}))
            }
            Err(e) => {
                let message = e.to_string();
                error!(inquiry_id = %inquiry_id, error = %message, "inquiry delivery failed");
                if let Err(e) = self.storage.mark_inquiry_failed(&inquiry_id, &message).await {
                    warn!(inquiry_id = %inquiry_id, error = %e, "could not mark inquiry failed");
                }
                Ok(json!({"ok": false, "inquiry_id": inquiry_id, "error": message}))
            }
        }
    }
}

/// The three built-in handlers wired to shared services.
pub fn builtin_handlers(
    products: Arc<ProductRetriever>,
    storage: Arc<dyn StorageAdapter>,
    notifier: Option<Arc<dyn Notifier>>,
) -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(ProductDetailsHandler::new(products.clone())),
        Arc::new(ProductSearchHandler::new(products.clone())),
        Arc::new(SendInquiryHandler::new(storage, notifier).with_products(products)),
    ]
}
