// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered `concierge.toml` configuration.
//!
//! Files are merged over compiled defaults, `CONCIERGE_*` variables win over
//! files, and every section rejects keys it does not know. Failures come back
//! as a list of [`ConfigError`] diagnostics ready for [`render_errors`].
//!
//! ```no_run
//! let config = concierge_config::load_and_validate().expect("config errors");
//! println!("model: {}", config.llm.model);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ConciergeConfig;

/// Every file the standard lookup reads, most specific first.
pub fn load_and_validate() -> Result<ConciergeConfig, Vec<ConfigError>> {
    checked(loader::load_config(), standard_sources)
}

/// One explicit file plus environment overrides.
pub fn load_and_validate_path(path: &Path) -> Result<ConciergeConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_source(path.display().to_string(), path)
            .into_iter()
            .collect()
    })
}

/// TOML text only. Environment and files are ignored.
pub fn load_and_validate_str(toml_content: &str) -> Result<ConciergeConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Runs semantic validation on a successful load. Sources are only read
/// back when figment failed and diagnostics need something to point into.
fn checked(
    loaded: Result<ConciergeConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<ConciergeConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

fn read_source(label: String, path: &Path) -> Option<(String, String)> {
    std::fs::read_to_string(path).ok().map(|content| (label, content))
}

fn standard_sources() -> Vec<(String, String)> {
    let local = Path::new(loader::LOCAL_CONFIG_PATH);
    let local_label = std::env::current_dir()
        .map(|dir| dir.join(local).display().to_string())
        .unwrap_or_else(|_| loader::LOCAL_CONFIG_PATH.to_string());
    let user = loader::user_config_path();
    let system = Path::new(loader::SYSTEM_CONFIG_PATH);

    [
        read_source(local_label, local),
        read_source(user.display().to_string(), &user),
        read_source(loader::SYSTEM_CONFIG_PATH.to_string(), system),
    ]
    .into_iter()
    .flatten()
    .collect()
}
