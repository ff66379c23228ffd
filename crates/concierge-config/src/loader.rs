// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment assembly. Later layers win:
//! defaults, `/etc/concierge`, the user config dir, `./concierge.toml`, then
//! `CONCIERGE_<SECTION>_<KEY>` variables.

#![allow(clippy::result_large_err)]

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ConciergeConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/concierge/concierge.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "concierge.toml";

/// Sections reachable through `CONCIERGE_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "engine",
    "llm",
    "embedding",
    "storage",
    "state",
    "index",
    "retrieval",
    "routing",
    "notify",
    "catalog",
];

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("concierge/concierge.toml"))
        .unwrap_or_default()
}

pub fn load_config() -> Result<ConciergeConfig, figment::Error> {
    layered().extract()
}

/// Defaults overlaid with `toml_content`; no files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<ConciergeConfig, figment::Error> {
    defaults().merge(Toml::string(toml_content)).extract()
}

/// Defaults, the file at `path`, then environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<ConciergeConfig, figment::Error> {
    defaults()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

fn defaults() -> Figment {
    Figment::from(Serialized::defaults(ConciergeConfig::default()))
}

/// The full lookup chain, not yet extracted.
pub fn layered() -> Figment {
    [
        PathBuf::from(SYSTEM_CONFIG_PATH),
        user_config_path(),
        PathBuf::from(LOCAL_CONFIG_PATH),
    ]
    .into_iter()
    .fold(defaults(), |figment, file| figment.merge(Toml::file(file)))
    .merge(env_provider())
}

/// `CONCIERGE_LLM_API_KEY` maps to `llm.api_key`: only the underscore after a
/// known section name becomes a dot.
fn env_provider() -> Env {
    Env::prefixed("CONCIERGE_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    ENV_SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)?
                .strip_prefix('_')
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or_else(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_section_only() {
        assert_eq!(map_env_key("llm_api_key"), "llm.api_key");
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(map_env_key("state_ttl_secs"), "state.ttl_secs");
        assert_eq!(map_env_key("embedding_batch_size"), "embedding.batch_size");
        assert_eq!(map_env_key("unknown_thing"), "unknown_thing");
    }
}
