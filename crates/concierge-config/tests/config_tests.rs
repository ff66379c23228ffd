// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Concierge configuration system.

use std::io::Write;

use concierge_config::diagnostic::ConfigError;
use concierge_config::model::{ConciergeConfig, IndexBackend, RoutingStrategy};
use concierge_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use serial_test::serial;

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[engine]
company_name = "Jwl Outdoor"
max_turns = 3

[llm]
api_key = "sk-test"
model = "gpt-4o"
model_type = "gpt-4o"

[embedding]
model = "text-embedding-3-large"
batch_size = 16

[state]
max_items = 10
ttl_secs = 60
confirm_keywords_strong = { en = ["ship it"] }

[index]
backend = "normalized"

[retrieval]
fuzzy_threshold = 0.9

[retrieval.on_stage.confirm_send]
product_k = 0
kb_k = 0

[retrieval.on_rag_mode.context_lock]
unless_flags = ["is_broad"]
kb_k = 1

[routing]
strategy = "embedding"
downgrade_intents = ["product_info"]

[routing.allocations.broad]
product = 5
kb = 0

[routing.intents.chitchat]
examples = ["hi", "how are you"]

[routing.intents.catalog]
examples = ["what do you sell"]
is_broad = true

[prompts.default.en]
role = "You work for {company}."

[tools.product_search]
enabled = false

[tool_responses.en]
missing_info = "I still need {missing}."

[notify]
smtp_host = "smtp.example.com"
from = "bot@example.com"
to = "sales@example.com"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.engine.company_name, "Jwl Outdoor");
    assert_eq!(config.engine.max_turns, 3);
    assert_eq!(config.engine.history_turns, 12);
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.llm.model_type.as_deref(), Some("gpt-4o"));
    assert_eq!(config.embedding.batch_size, 16);
    assert_eq!(config.state.max_items, 10);
    assert_eq!(
        config.state.confirm_keywords_strong.as_ref().unwrap()["en"],
        vec!["ship it"]
    );
    assert!(config.state.confirm_keywords_weak.is_none());
    assert_eq!(config.index.backend, IndexBackend::Normalized);
    assert_eq!(config.retrieval.on_stage["confirm_send"].product_k, Some(0));
    assert_eq!(
        config.retrieval.on_rag_mode["context_lock"].unless_flags,
        vec!["is_broad"]
    );
    assert_eq!(config.routing.strategy, RoutingStrategy::Embedding);
    assert_eq!(config.routing.allocations.broad.product, 5);
    assert_eq!(config.routing.allocations.default.kb, 3);
    assert!(config.routing.intents["catalog"].is_broad);
    assert_eq!(config.prompts["default"]["en"].role, "You work for {company}.");
    assert_eq!(config.tools["product_search"].enabled, Some(false));
    assert_eq!(
        config.tool_responses["en"]["missing_info"],
        "I still need {missing}."
    );
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should load");
    assert_eq!(config.engine.max_turns, 2);
    assert_eq!(config.engine.summary_max_chars, 900);
    assert_eq!(config.state.max_items, 2000);
    assert_eq!(config.state.ttl_secs, 86_400);
    assert_eq!(config.state.confirmation_slot, "confirm_send");
    assert_eq!(config.retrieval.fuzzy_threshold, 0.84);
    assert_eq!(config.routing.min_score, 0.25);
    assert_eq!(config.routing.no_rag_intents, vec!["chitchat"]);
    assert_eq!(config.routing.allocations.tech.product, 2);
    assert_eq!(config.index.backend, IndexBackend::Exact);
    assert!(config.prompts.contains_key("default"));
    assert!(config.notify.smtp_host.is_none());
}

#[test]
fn dotted_override_maps_into_section() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: ConciergeConfig = Figment::new()
        .merge(Serialized::defaults(ConciergeConfig::default()))
        .merge(Toml::string("[llm]\nmodel = \"from-toml\"\n"))
        .merge(("llm.model", "from-env"))
        .extract()
        .expect("should merge override");
    assert_eq!(config.llm.model, "from-env");
}

#[test]
fn user_prompt_merges_with_default_locales() {
    let config = load_config_from_str("[prompts.default.en]\nrole = \"custom\"\n").unwrap();
    assert_eq!(config.prompts["default"]["en"].role, "custom");
    assert!(config.prompts["default"].contains_key("zh"));
}

#[test]
fn unknown_key_suggests_correction() {
    let toml = "[retrieval]\nfuzy_threshold = 0.5\n";
    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "fuzy_threshold"
                && suggestion.as_deref() == Some("fuzzy_threshold")
                && valid_keys.contains("desc_max_len")
        })
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

#[test]
fn unknown_top_level_section_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "telegram"))
    );
}

#[test]
fn unsupported_backend_is_reported() {
    let errors = load_and_validate_str("[index]\nbackend = \"faiss\"\n").unwrap_err();
    let rendered = format!("{errors:?}");
    assert!(rendered.contains("faiss"), "got: {rendered}");
}

#[test]
fn invalid_type_message() {
    let err = load_config_from_str("[engine]\nmax_turns = \"two\"\n").unwrap_err();
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("max_turns"),
        "got: {err_str}"
    );
}

#[test]
fn validation_rejects_bad_rag_mode_flag() {
    let toml = "[retrieval.on_rag_mode.exact]\nunless_flags = [\"is_cheap\"]\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(&errors[0], ConfigError::Validation { message } if message.contains("is_cheap")));
}

#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let error = ConfigError::UnknownKey {
        key: "modle".to_string(),
        suggestion: Some("model".to_string()),
        valid_keys: "api_key, base_url, model".to_string(),
        span: None,
        src: None,
    };

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("modle"));
    assert!(buf.contains("did you mean `model`"));
}

#[test]
#[serial]
fn path_loading_applies_env_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[engine]\ncompany_name = \"Acme\"\n[llm]\nmodel = \"file-model\"").unwrap();

    unsafe { std::env::set_var("CONCIERGE_LLM_MODEL", "env-model") };
    let result = load_and_validate_path(file.path());
    unsafe { std::env::remove_var("CONCIERGE_LLM_MODEL") };

    let config = result.expect("should load");
    assert_eq!(config.engine.company_name, "Acme");
    assert_eq!(config.llm.model, "env-model");
}

#[test]
#[serial]
fn path_loading_reports_unknown_key() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[state]\nmax_itmes = 5").unwrap();

    let errors = load_and_validate_path(file.path()).unwrap_err();
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, .. }
            if key == "max_itmes" && suggestion.as_deref() == Some("max_items"))
    });
    assert!(found, "got: {errors:?}");
}
