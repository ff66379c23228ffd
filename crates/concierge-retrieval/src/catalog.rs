// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog items, knowledge chunks and their on-disk loaders.
//!
//! Catalog items come from a JSON array; knowledge chunks from every `*.jsonl`
//! file in a directory, one `{text, metadata}` object per line. Chunk texts may
//! carry `{{KEY}}` placeholders that are filled from a site-info JSON document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use concierge_config::model::CatalogConfig;
use concierge_core::ConciergeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Resolve a possibly-localized JSON value to display text.
///
/// Maps pick `locale`, then `en`. Lists are newline-joined. Nested objects are
/// rendered as compact JSON.
pub fn localized_text(value: &Value, locale: &str) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| localized_text(v, locale))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => {
            let picked = [locale, "en"]
                .iter()
                .filter_map(|key| map.get(*key))
                .find(|v| !is_blank(v));
            match picked {
                Some(nested @ Value::Object(_)) => nested.to_string(),
                Some(other) => localized_text(other, locale),
                None => String::new(),
            }
        }
        other => other.to_string(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Render an attribute value (materials, specifications) as a single line.
fn attribute_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One purchasable variant of a catalog item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Short variant key such as a color code.
    #[serde(default)]
    pub key: String,
    /// Stock keeping unit, when the catalog has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    /// Per-locale labels (`en`, `zh`, ...) and any other variant attributes.
    #[serde(flatten)]
    pub labels: BTreeMap<String, Value>,
}

impl Variant {
    /// Display label: the locale label, then `en`, then `name`, then the key.
    pub fn label(&self, locale: &str) -> String {
        for key in [locale, "en", "name"] {
            if let Some(value) = self.labels.get(key) {
                let text = localized_text(value, locale);
                if !text.is_empty() {
                    return text;
                }
            }
        }
        if self.key.is_empty() {
            "v".to_string()
        } else {
            self.key.clone()
        }
    }
}

/// A product in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable identifier, e.g. `jwl-outdoor-018`.
    #[serde(default)]
    pub id: String,
    /// URL slug; stands in for the id when that is empty.
    #[serde(default)]
    pub slug: String,
    /// A string or a locale map (`{"en": .., "zh": ..}`).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub name: Value,
    /// A string or a locale map.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub description: Value,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<Variant>,
    /// Any JSON shape; flattened to text for search and prompts.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub materials: Value,
    /// Usually a name-to-value map.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub specifications: Value,
    /// Fields this engine does not interpret, kept for tool output.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CatalogItem {
    pub fn name(&self, locale: &str) -> String {
        localized_text(&self.name, locale)
    }

    pub fn description(&self, locale: &str) -> String {
        localized_text(&self.description, locale)
    }

    /// Name in an explicit locale only, without fallback.
    pub fn name_exact(&self, locale: &str) -> String {
        match &self.name {
            Value::Object(map) => map
                .get(locale)
                .map(|v| localized_text(v, locale))
                .unwrap_or_default(),
            Value::String(s) if locale == "en" => s.clone(),
            _ => String::new(),
        }
    }

    fn description_exact(&self, locale: &str) -> String {
        match &self.description {
            Value::Object(map) => map
                .get(locale)
                .map(|v| localized_text(v, locale))
                .unwrap_or_default(),
            Value::String(s) if locale == "en" => s.clone(),
            _ => String::new(),
        }
    }

    /// Deterministic text used for the item's embedding.
    pub fn doc_text(&self) -> String {
        [
            format!("id: {}", self.id),
            format!("slug: {}", self.slug),
            format!("category: {}", self.category),
            format!("tags: {}", self.tags.join(" ")),
            format!("name_en: {}", self.name_exact("en")),
            format!("name_zh: {}", self.name_exact("zh")),
            format!("desc_en: {}", self.description_exact("en")),
            format!("desc_zh: {}", self.description_exact("zh")),
            format!("materials: {}", attribute_text(&self.materials)),
            format!("specifications: {}", attribute_text(&self.specifications)),
        ]
        .join("\n")
    }

    /// Whether `key` names this item by id or slug.
    pub fn is_named(&self, key: &str) -> bool {
        !key.is_empty() && (self.id == key || self.slug == key)
    }
}

/// A passage of the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Stable id: `metadata.kb_id` when present, else `{source}#{line}`.
    pub id: String,
    pub text: String,
    /// Basename of the file the chunk came from.
    pub source: String,
    /// Raw chunk metadata; `lang` drives locale filtering.
    #[serde(default)]
    pub metadata: Value,
}

impl KnowledgeChunk {
    /// The chunk's language tag, if any.
    pub fn lang(&self) -> Option<&str> {
        self.metadata
            .get("lang")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Chunks without a language tag are visible in every locale.
    pub fn visible_in(&self, locale: &str) -> bool {
        self.lang().is_none_or(|lang| lang == locale)
    }
}

#[derive(Deserialize)]
struct RawChunk {
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: Value,
}

/// `{{KEY}}` substitutions derived from the site-info document.
#[derive(Debug, Clone, Default)]
pub struct SiteTemplate {
    values: BTreeMap<String, String>,
}

impl SiteTemplate {
    /// Flatten the document with dot-joined keys and add the well-known aliases.
    pub fn from_value(site: &Value) -> Self {
        let mut values = BTreeMap::new();
        flatten_into(site, "", &mut values);

        let email = site
            .pointer("/contact/email/en")
            .or_else(|| site.pointer("/contact/email"))
            .filter(|v| !v.is_object());
        if let Some(email) = email {
            values.insert("SALES_EMAIL".to_string(), scalar_text(email));
        }
        if let Some(company) = site.pointer("/companyName/en") {
            values.insert("COMPANY_NAME".to_string(), scalar_text(company));
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace every known `{{KEY}}`; unknown placeholders stay as written.
    pub fn render(&self, text: &str) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }
        let mut out = text.to_string();
        for (key, value) in &self.values {
            let placeholder = format!("{{{{{key}}}}}");
            if out.contains(&placeholder) {
                out = out.replace(&placeholder, value);
            }
        }
        out
    }
}

fn flatten_into(value: &Value, prefix: &str, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, &path, out);
            }
        }
        Value::Array(items) if !prefix.is_empty() => {
            let joined = items.iter().map(scalar_text).collect::<Vec<_>>().join(", ");
            out.insert(prefix.to_string(), joined);
        }
        other if !prefix.is_empty() => {
            out.insert(prefix.to_string(), scalar_text(other));
        }
        _ => {}
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Load catalog items from a JSON array file.
pub fn load_products(path: &Path) -> Result<Vec<CatalogItem>, ConciergeError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConciergeError::Config(format!("cannot read catalog {}: {e}", path.display()))
    })?;
    let items: Vec<CatalogItem> = serde_json::from_str(&content).map_err(|e| {
        ConciergeError::Config(format!("invalid catalog {}: {e}", path.display()))
    })?;
    let (kept, dropped): (Vec<_>, Vec<_>) = items
        .into_iter()
        .partition(|item| !item.id.is_empty() || !item.slug.is_empty());
    if !dropped.is_empty() {
        warn!(count = dropped.len(), "catalog items without id or slug skipped");
    }
    Ok(kept)
}

/// Load site info used for chunk templating.
pub fn load_site_template(path: &Path) -> Result<SiteTemplate, ConciergeError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConciergeError::Config(format!("cannot read site info {}: {e}", path.display()))
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        ConciergeError::Config(format!("invalid site info {}: {e}", path.display()))
    })?;
    Ok(SiteTemplate::from_value(&value))
}

/// Load every `*.jsonl` file under `dir`, in file-name order.
///
/// Unparseable lines are logged and skipped. Texts are rendered through
/// `template` before they are returned.
pub fn load_kb_dir(
    dir: &Path,
    template: &SiteTemplate,
) -> Result<Vec<KnowledgeChunk>, ConciergeError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        ConciergeError::Config(format!("cannot read kb dir {}: {e}", dir.display()))
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    files.sort();

    let mut chunks = Vec::new();
    for file in files {
        let source = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "kb file unreadable, skipping");
                continue;
            }
        };
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let raw: RawChunk = match serde_json::from_str(line) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(file = %source, line = idx + 1, error = %e, "bad kb line skipped");
                    continue;
                }
            };
            if raw.text.trim().is_empty() {
                continue;
            }
            let id = raw
                .metadata
                .get("kb_id")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{source}#{}", idx + 1));
            chunks.push(KnowledgeChunk {
                id,
                text: template.render(&raw.text),
                source: source.clone(),
                metadata: raw.metadata,
            });
        }
    }
    debug!(dir = %dir.display(), chunks = chunks.len(), "kb loaded");
    Ok(chunks)
}

/// Everything the retrievers are built from.
/// Everything loaded from the `[catalog]` locations.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub products: Vec<CatalogItem>,
    /// KB chunks with site templates already applied.
    pub chunks: Vec<KnowledgeChunk>,
}

impl Catalog {
    /// Load products, site info and the KB from the configured locations.
    ///
    /// Missing or unreadable sources are logged and yield an empty part so
    /// the engine can still answer without grounding.
    pub fn load(config: &CatalogConfig) -> Self {
        let products = load_products(Path::new(&config.products_path)).unwrap_or_else(|e| {
            warn!(error = %e, "catalog unavailable");
            Vec::new()
        });
        let template = match &config.site_info_path {
            Some(path) => load_site_template(Path::new(path)).unwrap_or_else(|e| {
                warn!(error = %e, "site info unavailable, kb templates left as-is");
                SiteTemplate::default()
            }),
            None => SiteTemplate::default(),
        };
        let chunks = load_kb_dir(Path::new(&config.kb_dir), &template).unwrap_or_else(|e| {
            warn!(error = %e, "knowledge base unavailable");
            Vec::new()
        });
        info!(products = products.len(), chunks = chunks.len(), "catalog loaded");
        Self { products, chunks }
    }
}
