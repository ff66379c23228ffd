// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-facing configuration diagnostics.
//!
//! Every figment failure becomes a [`ConfigError`] that miette can render.
//! Unknown keys get a label pointing into the offending TOML file and a
//! spelling suggestion when a valid key is close enough.

#![allow(unused_assignments)] // emitted by the miette Diagnostic derive

use figment::error::{Error as FigmentError, Kind};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler similarity a valid key needs before it is suggested.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(concierge::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a recognized setting here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(concierge::config::invalid_type), help("use a value of type {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("`{key}` does not accept `{value}`")]
    #[diagnostic(
        code(concierge::config::invalid_value),
        help("choose one of: {expected}")
    )]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("required key `{key}` is missing")]
    #[diagnostic(
        code(concierge::config::missing_key),
        help("set `{key}` in concierge.toml")
    )]
    MissingKey { key: String },

    /// A semantic check failed after deserialization.
    #[error("validation error: {message}")]
    #[diagnostic(code(concierge::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(concierge::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

impl ConfigError {
    /// Classify one figment error. `sources` holds `(path, content)` of the
    /// TOML files that were read, for source labels.
    fn from_figment(error: FigmentError, sources: &[(String, String)]) -> Self {
        let section: Vec<String> = error.path.clone();
        match &error.kind {
            Kind::UnknownField(field, expected) => {
                let suggestion = suggest_key(field, expected);
                let located = locate(&error, sources)
                    .and_then(|(path, content)| {
                        find_key_offset(content, &section, field).map(|offset| (path, content, offset))
                    });
                let (span, src) = match located {
                    Some((path, content, offset)) => (
                        Some(SourceSpan::new(offset.into(), field.len())),
                        Some(NamedSource::new(path, content.clone())),
                    ),
                    None => (None, None),
                };
                Self::UnknownKey {
                    key: field.clone(),
                    suggestion,
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => Self::MissingKey {
                key: dotted(&section, field),
            },
            Kind::InvalidType(actual, expected) => Self::InvalidType {
                key: section.join("."),
                detail: format!("found {actual}"),
                expected: expected.clone(),
            },
            Kind::UnknownVariant(value, expected) => Self::InvalidValue {
                key: section.join("."),
                value: value.clone(),
                expected: expected.join(", "),
            },
            _ => Self::Other(error.to_string()),
        }
    }
}

fn dotted(section: &[String], field: &str) -> String {
    if section.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", section.join("."))
    }
}

/// Expand a figment error (which may chain several) into diagnostics.
pub fn figment_to_config_errors(
    err: FigmentError,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| ConfigError::from_figment(error, toml_sources))
        .collect()
}

/// The source file an error came from. Inline TOML has no file metadata, so
/// a single candidate source is assumed to be the one.
fn locate<'a>(error: &FigmentError, sources: &'a [(String, String)]) -> Option<&'a (String, String)> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    match file {
        Some(file) => sources.iter().find(|(path, _)| *path == file),
        None if sources.len() == 1 => sources.first(),
        None => None,
    }
}

/// Byte offset of `field` inside the TOML table named by `section`.
///
/// Lines are scanned while tracking the current `[table]` header, so a key
/// with the same name in another table is never matched. An empty `section`
/// means the root table.
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let wanted = section.join(".");
    let mut current = String::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let body = line.trim();

        if let Some(header) = body.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            current = header.trim_matches(|c| c == '[' || c == ']').trim().to_string();
        } else if current == wanted
            && let Some(rest) = body.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Closest valid key, if any clears the similarity threshold.
pub fn suggest_key<S: AsRef<str>>(unknown: &str, valid_keys: &[S]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (key.as_ref(), strsim::jaro_winkler(unknown, key.as_ref())))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(key, _)| key.to_string())
}

/// Print every error to stderr through miette's graphical report handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}
