// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment errors are turned into miette reports. Unknown keys are pointed
//! at in the TOML file that contains them and get a "did you mean" hint
//! from Jaro-Winkler similarity against the keys the section accepts.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Similarity a known key needs before it is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// The text of one TOML file that took part in loading, for span lookup.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path as figment reports it, or a placeholder such as `<inline>`.
    pub name: String,
    pub content: String,
}

impl ConfigSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A problem with the loaded configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(leadwire::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys the section accepts.
        valid_keys: String,
        #[label("not a leadwire setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value outside an enumerated set, such as an unknown specialty.
    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(code(leadwire::config::invalid_value), help("accepted values: {accepted}"))]
    InvalidValue {
        key: String,
        detail: String,
        accepted: String,
    },

    #[error("invalid type for `{key}`: {detail}")]
    #[diagnostic(code(leadwire::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(leadwire::config::missing_key),
        help("add `{key} = <value>` to leadwire.toml")
    )]
    MissingKey { key: String },

    /// A value that parsed but breaks a cross-field or range rule.
    #[error("validation error: {message}")]
    #[diagnostic(code(leadwire::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(leadwire::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert every error carried by `err` into a diagnostic.
pub fn figment_to_config_errors(err: figment::Error, sources: &[ConfigSource]) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let key = error.path.join(".");
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = match source_of(&error, sources) {
                        Some(source) => {
                            let section = error.path.first().map(String::as_str);
                            match locate_key(&source.content, section, field) {
                                Some(offset) => (
                                    Some(SourceSpan::new(offset.into(), field.len())),
                                    Some(NamedSource::new(&source.name, source.content.clone())),
                                ),
                                None => (None, None),
                            }
                        }
                        None => (None, None),
                    };
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: if key.is_empty() {
                        field.to_string()
                    } else {
                        format!("{key}.{field}")
                    },
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key,
                    detail: format!("found {actual}"),
                    expected: expected.clone(),
                },
                Kind::UnknownVariant(found, expected) => ConfigError::InvalidValue {
                    key,
                    detail: format!("unknown variant `{found}`"),
                    accepted: expected.join(", "),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// The loaded source text that produced `error`, if it came from a file we read.
fn source_of<'a>(error: &figment::Error, sources: &'a [ConfigSource]) -> Option<&'a ConfigSource> {
    let name = match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => path.display().to_string(),
        figment::Source::Code(_) => "<inline>".to_string(),
        _ => return None,
    };
    sources.iter().find(|s| s.name == name)
}

/// Byte offset of `key` inside `section` (`None` for top-level keys).
///
/// Tracks `[table]` and `[[array]]` headers line by line, so a key is only
/// matched inside the section it belongs to.
pub fn locate_key(content: &str, section: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            current = Some(trimmed.trim_matches(|c: char| c == '[' || c == ']' || c.is_whitespace()));
        } else if current == section {
            if let Some(rest) = trimmed.strip_prefix(key) {
                if rest.trim_start().starts_with('=') {
                    return Some(offset + (line.len() - trimmed.len()));
                }
            }
        }
        offset += line.len();
    }
    None
}

/// The accepted key most similar to `unknown`, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print each error to stderr as a graphical miette report.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typos_get_the_closest_key() {
        let whatsapp = &["bridge_url", "session_dir", "auto_reconnect", "channel"];
        assert_eq!(suggest_key("bridge_ulr", whatsapp).as_deref(), Some("bridge_url"));
        let pipeline = &["auto_reply", "history_window", "stage_timeout_secs"];
        assert_eq!(suggest_key("auto_replay", pipeline).as_deref(), Some("auto_reply"));
        assert_eq!(suggest_key("zzzzzz", &["name", "log_level"]), None);
    }

    #[test]
    fn key_is_located_in_its_own_section() {
        let content = "[agent]\nauto_replay = 1\n\n[pipeline]\n  auto_replay = true\n";
        let offset = locate_key(content, Some("pipeline"), "auto_replay").unwrap();
        assert_eq!(offset, content.rfind("auto_replay").unwrap());
    }

    #[test]
    fn key_is_located_in_array_table() {
        let content = "[agent]\nname = \"x\"\n\n[[specialists]]\nnmae = \"precios\"\n";
        let offset = locate_key(content, Some("specialists"), "nmae").unwrap();
        assert_eq!(&content[offset..offset + 4], "nmae");
    }

    #[test]
    fn top_level_key_stops_at_first_header() {
        let content = "agnet = 1\n[agent]\nname = \"x\"\n";
        assert_eq!(locate_key(content, None, "agnet"), Some(0));
        assert_eq!(locate_key(content, None, "name"), None);
    }

    #[test]
    fn prefix_of_longer_key_is_not_matched() {
        let content = "[whatsapp]\nchannel_name = \"a\"\nchannel = \"b\"\n";
        let offset = locate_key(content, Some("whatsapp"), "channel").unwrap();
        assert_eq!(offset, content.find("channel =").unwrap());
    }

    #[test]
    fn unknown_specialty_becomes_invalid_value() {
        let err = crate::load_config_from_str(
            "[[specialists]]\nname = \"a\"\nspecialty = \"shipping\"\ninstructions = \"b\"\n",
        )
        .unwrap_err();
        let errors = figment_to_config_errors(err, &[]);
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidValue { accepted, .. } if accepted.contains("pricing")
        )));
    }
}
