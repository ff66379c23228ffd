// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Role and policy prompt selection.
//!
//! Prompt sets are keyed by model key, then locale. The model key comes from
//! an explicit `llm.model_type`, an exact entry for the model name, or the
//! longest configured key contained in the model name, in that order, and
//! otherwise `default`.

use std::collections::BTreeMap;

use concierge_config::ConciergeConfig;
use concierge_config::model::PromptConfig;
use tracing::debug;

pub const DEFAULT_MODEL_KEY: &str = "default";

#[derive(Debug, Clone)]
pub struct PromptSelector {
    prompts: BTreeMap<String, BTreeMap<String, PromptConfig>>,
    model_type: Option<String>,
    company: String,
}

impl PromptSelector {
    pub fn new(
        prompts: BTreeMap<String, BTreeMap<String, PromptConfig>>,
        model_type: Option<String>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            prompts,
            model_type: model_type
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty() && m != DEFAULT_MODEL_KEY),
            company: company.into(),
        }
    }

    pub fn from_config(config: &ConciergeConfig) -> Self {
        Self::new(
            config.prompts.clone(),
            config.llm.model_type.clone(),
            config.engine.company_name.clone(),
        )
    }

    /// The prompt set key used for `model`.
    pub fn model_key(&self, model: &str) -> String {
        if let Some(explicit) = &self.model_type {
            return explicit.clone();
        }
        let model = model.trim().to_lowercase();
        if self.prompts.contains_key(&model) {
            return model;
        }
        let mut keys: Vec<&String> = self
            .prompts
            .keys()
            .filter(|k| k.as_str() != DEFAULT_MODEL_KEY && !k.is_empty())
            .collect();
        keys.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));
        keys.into_iter()
            .find(|k| model.contains(&k.to_lowercase()))
            .cloned()
            .unwrap_or_else(|| DEFAULT_MODEL_KEY.to_string())
    }

    fn lookup(&self, key: &str, locale: &str) -> Option<&PromptConfig> {
        self.prompts.get(key).and_then(|by_locale| by_locale.get(locale))
    }

    /// The role and policy text for `model` in `locale`.
    pub fn system_prompt(&self, model: &str, locale: &str) -> String {
        let key = self.model_key(model);
        let prompt = self
            .lookup(&key, locale)
            .or_else(|| self.lookup(DEFAULT_MODEL_KEY, locale))
            .or_else(|| self.lookup(&key, "en"))
            .or_else(|| self.lookup(DEFAULT_MODEL_KEY, "en"));
        let Some(prompt) = prompt else {
            debug!(model_key = %key, locale = %locale, "no prompt configured");
            return String::new();
        };

        let role = prompt.role.replace("{company}", &self.company);
        [
            role.as_str(),
            &prompt.strict_policy,
            &prompt.general_rules,
            &prompt.output_req,
        ]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}
