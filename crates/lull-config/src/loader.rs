// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier): compiled defaults,
//! `/etc/lull/lull.toml`, `~/.config/lull/lull.toml`, `./lull.toml`,
//! then `LULL_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LullConfig;
use crate::{LOCAL_CONFIG, SYSTEM_CONFIG};

/// Config sections addressable from the environment.
const SECTIONS: &[&str] = &[
    "service",
    "store",
    "conversation",
    "buffer",
    "notifier",
    "gateway",
];

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<LullConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no environment).
pub fn load_config_from_str(toml_content: &str) -> Result<LullConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LullConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file, still honouring env overrides.
pub fn load_config_from_path(path: &Path) -> Result<LullConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LullConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The un-extracted Figment for the standard hierarchy.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LullConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("lull").join(LOCAL_CONFIG))
                .unwrap_or_default(),
        ))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// `LULL_BUFFER_WINDOW_MS` -> `buffer.window_ms`.
///
/// Only the first underscore after a known section name becomes a dot;
/// `split("_")` would turn `window_ms` into `window.ms`.
fn env_provider() -> Env {
    Env::prefixed("LULL_").map(|key| map_env_key(key.as_str()).into())
}

/// Figment hands over the variable name as written, usually uppercase.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("buffer_window_ms"), "buffer.window_ms");
        assert_eq!(map_env_key("gateway_bearer_token"), "gateway.bearer_token");
        assert_eq!(
            map_env_key("notifier_require_expiry_events"),
            "notifier.require_expiry_events"
        );
        assert_eq!(map_env_key("unknown_key"), "unknown_key");
    }

    #[test]
    fn uppercase_env_keys_map_to_sections() {
        assert_eq!(map_env_key("BUFFER_WINDOW_MS"), "buffer.window_ms");
        assert_eq!(map_env_key("GATEWAY_BEARER_TOKEN"), "gateway.bearer_token");
    }

    #[test]
    fn empty_string_gives_defaults() {
        let config = load_config_from_str("").expect("defaults should load");
        assert_eq!(config.buffer.window_ms, 2000);
    }
}
