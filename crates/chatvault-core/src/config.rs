//! Configuration types and loading for chatvault.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::backend::BackendConfig;
use crate::error::Result;
use crate::search::{DEFAULT_SNIPPET_RADIUS, SearchOptions};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Which backend stores sessions, and its settings.
    pub storage: BackendConfig,

    /// Search configuration.
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from the default config file.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file, with `CHATVAULT__*`
    /// environment variables layered on top.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `CHATVAULT__STORAGE__TYPE=sqlite`.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::from(path.to_path_buf()).format(::config::FileFormat::Toml),
            )
            .add_source(
                ::config::Environment::with_prefix(&crate::env_prefix())
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.expand_paths();
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_dir().join("config.toml")
    }

    /// Save configuration to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| Error::io(format!("writing {}", path.display()), e))?;
        Ok(())
    }

    /// Ensure config exists at the given path, creating defaults if missing.
    pub fn ensure_at(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            let mut config = Self::default();
            config.expand_paths();
            config.save_to_path(path)?;
            Ok(config)
        }
    }

    /// Expand a path, replacing ~ with home directory.
    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::full(path)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| path.to_string());
        PathBuf::from(expanded)
    }

    fn expand_paths(&mut self) {
        if let Some(path) = self.storage.setting_str("path") {
            let expanded = Self::expand_path(path).to_string_lossy().to_string();
            self.storage
                .settings
                .insert("path".to_string(), serde_json::Value::String(expanded));
        }
    }

    /// Search options derived from this configuration.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            snippet_radius: self.search.snippet_radius,
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    /// Characters of context on each side of a match in snippets.
    pub snippet_radius: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            snippet_radius: DEFAULT_SNIPPET_RADIUS,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
