// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-based configuration loading.
//!
//! Layers, later ones winning: compiled defaults, `/etc/leadwire/leadwire.toml`,
//! `~/.config/leadwire/leadwire.toml`, `./leadwire.toml`, then `LEADWIRE_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LeadwireConfig;

/// Config files consulted by [`load_config`], lowest precedence first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/leadwire/leadwire.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("leadwire").join("leadwire.toml"));
    }
    paths.push(PathBuf::from("leadwire.toml"));
    paths
}

fn defaults() -> Figment {
    Figment::from(Serialized::defaults(LeadwireConfig::default()))
}

/// The full layered figment, before extraction.
pub fn build_figment() -> Figment {
    search_paths()
        .into_iter()
        .fold(defaults(), |figment, path| figment.merge(Toml::file(path)))
        .merge(env_provider())
}

/// Load from the search paths with environment overrides.
pub fn load_config() -> Result<LeadwireConfig, figment::Error> {
    build_figment().extract()
}

/// Load from one explicit file, still applying environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<LeadwireConfig, figment::Error> {
    defaults()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load from TOML text alone: no files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<LeadwireConfig, figment::Error> {
    defaults().merge(Toml::string(toml_content)).extract()
}

/// Environment provider with explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: `LEADWIRE_OPENAI_API_KEY`
/// must map to `openai.api_key`, not `openai.api.key`.
fn env_provider() -> Env {
    Env::prefixed("LEADWIRE_").map(|key| {
        let mapped = map_env_key(key.as_str());
        mapped.into()
    })
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: &[&str] = &["agent", "whatsapp", "openai", "storage", "pipeline"];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
