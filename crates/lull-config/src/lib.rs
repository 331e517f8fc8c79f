// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the lull debounce engine.
//!
//! TOML configuration with strict key checking (`deny_unknown_fields`), an
//! XDG file hierarchy, `LULL_*` environment overrides, and miette diagnostics
//! with typo suggestions.
//!
//! ```no_run
//! use lull_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("debounce window: {}ms", config.buffer.window_ms);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use tracing::debug;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::LullConfig;

/// File locations searched, lowest precedence first.
const SYSTEM_CONFIG: &str = "/etc/lull/lull.toml";
const LOCAL_CONFIG: &str = "lull.toml";

/// Load configuration from the XDG hierarchy and validate it.
///
/// Deserialization failures are turned into diagnostics that point into the
/// TOML file they came from; semantic failures come from [`validation`].
pub fn load_and_validate() -> Result<LullConfig, Vec<ConfigError>> {
    debug!("loading configuration from the standard locations");
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &collect_toml_sources(),
        )),
    }
}

/// Load configuration from a specific file and validate it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<LullConfig, Vec<ConfigError>> {
    debug!(path = %path.display(), "loading configuration file");
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = std::fs::read_to_string(path)
                .map(|content| vec![(path.display().to_string(), content)])
                .unwrap_or_default();
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<LullConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = vec![std::path::PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("lull").join(LOCAL_CONFIG));
    }
    candidates.push(
        std::env::current_dir()
            .map(|d| d.join(LOCAL_CONFIG))
            .unwrap_or_else(|_| LOCAL_CONFIG.into()),
    );

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
