// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Localized customer-facing texts for tool outcomes.

use std::collections::BTreeMap;

use concierge_config::ConciergeConfig;

pub const CONFIRM_NEEDED: &str = "confirm_needed";
pub const MISSING_INFO: &str = "missing_info";
pub const SUCCESS: &str = "success";
pub const FAILURE: &str = "failure";

const BUILTIN_EN: &[(&str, &str)] = &[
    (
        CONFIRM_NEEDED,
        "Before I send your inquiry, please confirm by replying \"yes, send it\".",
    ),
    (
        MISSING_INFO,
        "To send your inquiry I still need your name, your email address and a short message.",
    ),
    (
        SUCCESS,
        "Your inquiry has been sent. Our sales team will reply by email shortly.",
    ),
    (FAILURE, "Sorry, your inquiry could not be sent: {error}"),
];

const BUILTIN_ZH: &[(&str, &str)] = &[
    (CONFIRM_NEEDED, "发送询盘前，请回复“确认发送”进行确认。"),
    (MISSING_INFO, "发送询盘还需要您的姓名、邮箱和简短的需求描述。"),
    (SUCCESS, "您的询盘已发送，销售团队会尽快通过邮件回复您。"),
    (FAILURE, "抱歉，询盘发送失败：{error}"),
];

/// Locale-keyed message table: built-in texts with per-key overrides.
#[derive(Debug, Clone)]
pub struct ToolResponses {
    table: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for ToolResponses {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl ToolResponses {
    pub fn new(overrides: &BTreeMap<String, BTreeMap<String, String>>) -> Self {
        let mut table: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (locale, entries) in [("en", BUILTIN_EN), ("zh", BUILTIN_ZH)] {
            table.insert(
                locale.to_string(),
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        for (locale, entries) in overrides {
            let slot = table.entry(locale.trim().to_lowercase()).or_default();
            for (key, text) in entries {
                slot.insert(key.clone(), text.clone());
            }
        }
        Self { table }
    }

    pub fn from_config(config: &ConciergeConfig) -> Self {
        Self::new(&config.tool_responses)
    }

    fn lookup(&self, key: &str, locale: &str) -> Option<&str> {
        let locale = locale.trim().to_lowercase();
        let primary = locale.split(['-', '_']).next().unwrap_or_default().to_string();
        [locale, primary, "en".to_string()]
            .iter()
            .filter_map(|l| self.table.get(l))
            .find_map(|entries| entries.get(key))
            .map(String::as_str)
    }

    /// The text for `key` in `locale` (falling back to `en`), with `{name}`
    /// placeholders filled from `vars`. Unknown keys give an empty string.
    pub fn get(&self, key: &str, locale: &str, vars: &[(&str, &str)]) -> String {
        let Some(text) = self.lookup(key, locale) else {
            return String::new();
        };
        vars.iter().fold(text.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{name}}}"), value)
        })
    }
}
