// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for udash
//!
//! Loads configuration from .udashrc.toml in current directory or ~/.config/udash/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::api::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_USERS_ENDPOINT};
use crate::debounce::DebouncePolicy;
use crate::pagination::DEFAULT_ITEMS_PER_PAGE;
use crate::store::DEFAULT_CACHE_TTL;

const LOCAL_CONFIG_FILE: &str = ".udashrc.toml";
const STATE_FILE_NAME: &str = "state.json";

/// Configuration loaded from .udashrc.toml or ~/.config/udash/config.toml
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Users collection endpoint
    pub api_url: Option<String>,
    /// Seconds a fetched user list stays fresh
    pub cache_ttl_secs: Option<u64>,
    /// Users shown per page
    pub items_per_page: Option<usize>,
    /// Settling window for search input in milliseconds
    pub debounce_ms: Option<u64>,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: Option<u64>,
    /// Where session state (search term, page) is kept
    pub state_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .udashrc.toml in current directory
    /// 2. ~/.config/udash/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(LOCAL_CONFIG_FILE)) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("udash").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    pub fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse config");
                None
            }
        }
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_USERS_ENDPOINT)
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn debounce_policy(&self) -> DebouncePolicy {
        match self.debounce_ms {
            Some(200) | None => DebouncePolicy::Optimized,
            Some(300) => DebouncePolicy::Simple,
            Some(ms) => DebouncePolicy::Custom(Duration::from_millis(ms)),
        }
    }

    /// Merge CLI options with config (CLI wins)
    pub fn merge_items_per_page(&self, cli_value: Option<usize>) -> usize {
        cli_value
            .or(self.items_per_page)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_ITEMS_PER_PAGE)
    }

    /// Merge CLI options with config (CLI wins)
    pub fn merge_api_url(&self, cli_value: Option<&str>) -> String {
        cli_value.unwrap_or_else(|| self.api_url()).to_string()
    }

    /// Configured state file, else `<data dir>/udash/state.json`.
    pub fn state_file(&self) -> Option<PathBuf> {
        self.state_file
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("udash").join(STATE_FILE_NAME)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_all_keys() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "api_url = \"http://localhost:3000/users\"\n\
             cache_ttl_secs = 30\n\
             items_per_page = 9\n\
             debounce_ms = 300\n\
             state_file = \"/tmp/udash-state.json\"\n",
        )
        .expect("write config");

        let config = Config::load_from_path(&path).expect("config");
        assert_eq!(config.api_url(), "http://localhost:3000/users");
        assert_eq!(config.cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.merge_items_per_page(None), 9);
        assert_eq!(config.debounce_policy(), DebouncePolicy::Simple);
        assert_eq!(config.state_file(), Some(PathBuf::from("/tmp/udash-state.json")));
    }

    #[test]
    fn malformed_config_is_ignored() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "items_per_page = \"many\"").expect("write config");
        assert_eq!(Config::load_from_path(&path), None);
    }

    #[test]
    fn defaults_and_cli_precedence() {
        let config = Config::default();
        assert_eq!(config.api_url(), DEFAULT_USERS_ENDPOINT);
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.debounce_policy(), DebouncePolicy::Optimized);
        assert_eq!(config.merge_items_per_page(Some(4)), 4);
        assert_eq!(config.merge_items_per_page(Some(0)), DEFAULT_ITEMS_PER_PAGE);
        assert_eq!(config.merge_api_url(Some("http://x/users")), "http://x/users");
    }
}
