// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express: numeric
//! ranges, keyword patterns that must compile, and required delivery fields.

use crate::diagnostic::ConfigError;
use crate::model::ConciergeConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const ROUTE_FLAGS: &[&str] = &["is_broad", "is_tech"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ConciergeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.engine.log_level.as_str()) {
        fail(format!(
            "engine.log_level `{}` must be one of {}",
            config.engine.log_level,
            LOG_LEVELS.join(", ")
        ));
    }
    if config.engine.max_turns == 0 {
        fail("engine.max_turns must be at least 1".to_string());
    }
    if config.engine.rag_query_turns == 0 {
        fail("engine.rag_query_turns must be at least 1".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.state.max_items == 0 {
        fail("state.max_items must be at least 1".to_string());
    }
    if config.state.recent_turns == 0 {
        fail("state.recent_turns must be at least 1".to_string());
    }
    if config.state.confirmation_slot.trim().is_empty() {
        fail("state.confirmation_slot must not be empty".to_string());
    }

    if config.embedding.batch_size == 0 {
        fail("embedding.batch_size must be at least 1".to_string());
    }

    let fuzzy = config.retrieval.fuzzy_threshold;
    if !(0.0..=1.0).contains(&fuzzy) {
        fail(format!(
            "retrieval.fuzzy_threshold must be within [0, 1], got {fuzzy}"
        ));
    }
    let alpha = config.retrieval.hybrid_alpha;
    if !alpha.is_finite() || alpha < 0.0 {
        fail(format!(
            "retrieval.hybrid_alpha must be a non-negative number, got {alpha}"
        ));
    }
    if config.retrieval.kb_oversample == 0 {
        fail("retrieval.kb_oversample must be at least 1".to_string());
    }
    for (mode, rule) in &config.retrieval.on_rag_mode {
        for flag in &rule.unless_flags {
            if !ROUTE_FLAGS.contains(&flag.as_str()) {
                fail(format!(
                    "retrieval.on_rag_mode.{mode}.unless_flags contains `{flag}`; expected one of {}",
                    ROUTE_FLAGS.join(", ")
                ));
            }
        }
    }

    let routing = &config.routing;
    for (name, score) in [
        ("min_score", routing.min_score),
        ("low_score_threshold", routing.low_score_threshold),
    ] {
        if !(-1.0..=1.0).contains(&score) {
            fail(format!("routing.{name} must be within [-1, 1], got {score}"));
        }
    }
    for (list, keywords) in [
        ("technical_keywords", &routing.technical_keywords),
        ("broad_keywords", &routing.broad_keywords),
    ] {
        for keyword in keywords {
            if is_pattern(keyword)
                && let Err(e) = regex::Regex::new(&format!("(?i){keyword}"))
            {
                fail(format!("routing.{list} pattern `{keyword}` does not compile: {e}"));
            }
        }
    }

    if !config.prompts.contains_key("default") {
        fail("prompts must define a `default` model key".to_string());
    }

    if config.notify.smtp_host.is_some() {
        if config.notify.from.is_none() {
            fail("notify.from is required when notify.smtp_host is set".to_string());
        }
        if config.notify.to.is_none() {
            fail("notify.to is required when notify.smtp_host is set".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Keyword entries containing `\` or `[` are treated as regular expressions.
pub fn is_pattern(keyword: &str) -> bool {
    keyword.contains('\\') || keyword.contains('[')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(validate_config(&ConciergeConfig::default()).is_ok());
    }

    #[test]
    fn collects_multiple_failures() {
        let mut config = ConciergeConfig::default();
        config.engine.max_turns = 0;
        config.retrieval.fuzzy_threshold = 1.5;
        config.routing.technical_keywords.push(r"\bsize[".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn negative_hybrid_weight_is_rejected() {
        let mut config = ConciergeConfig::default();
        config.retrieval.hybrid_alpha = -0.1;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("retrieval.hybrid_alpha"));
    }

    #[test]
    fn smtp_host_requires_addresses() {
        let mut config = ConciergeConfig::default();
        config.notify.smtp_host = Some("smtp.example.com".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn pattern_detection() {
        assert!(is_pattern(r"\bmoq\b"));
        assert!(is_pattern("[0-9]+ pcs"));
        assert!(!is_pattern("lead time"));
    }
}
