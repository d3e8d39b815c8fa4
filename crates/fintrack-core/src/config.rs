//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the backend URL and the last used username.
//!
//! Configuration is stored at `~/.config/fintrack/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE_URL;

/// Application name used for config/storage directory paths
const APP_NAME: &str = "fintrack";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the configured backend URL
pub const API_BASE_URL_ENV: &str = "FINTRACK_API_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Backend URL: environment first, then config file, then the default.
    pub fn api_base_url(&self) -> String {
        Self::resolve_api_base_url(std::env::var(API_BASE_URL_ENV).ok(), self.api_base_url.as_deref())
    }

    fn resolve_api_base_url(env: Option<String>, configured: Option<&str>) -> String {
        env.filter(|url| !url.trim().is_empty())
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    /// Durable storage: session and preferences, kept across runs.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find local data directory"))?;
        Ok(data_dir.join(APP_NAME).join("storage"))
    }

    /// Volatile storage: the dashboard snapshot. Per user, preferring the
    /// runtime dir (cleared when the user logs out of the OS) over the cache
    /// dir.
    pub fn volatile_dir(&self) -> Result<PathBuf> {
        Self::resolve_volatile_dir(dirs::runtime_dir(), dirs::cache_dir())
            .ok_or_else(|| anyhow::anyhow!("Could not find runtime or cache directory"))
    }

    fn resolve_volatile_dir(runtime: Option<PathBuf>, cache: Option<PathBuf>) -> Option<PathBuf> {
        runtime
            .or(cache)
            .map(|dir| dir.join(APP_NAME).join("session"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_base_url: Some("https://fintrack.example.com/api/v1".to_string()),
            last_username: Some("alice".to_string()),
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_api_base_url_precedence() {
        assert_eq!(
            Config::resolve_api_base_url(Some("http://env/api".into()), Some("http://file/api")),
            "http://env/api"
        );
        assert_eq!(
            Config::resolve_api_base_url(Some("  ".into()), Some("http://file/api")),
            "http://file/api"
        );
        assert_eq!(Config::resolve_api_base_url(None, None), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_volatile_dir_is_per_user() {
        let runtime = PathBuf::from("/run/user/1000");
        let cache = PathBuf::from("/home/alice/.cache");

        assert_eq!(
            Config::resolve_volatile_dir(Some(runtime.clone()), Some(cache.clone())),
            Some(runtime.join("fintrack").join("session"))
        );
        assert_eq!(
            Config::resolve_volatile_dir(None, Some(cache.clone())),
            Some(cache.join("fintrack").join("session"))
        );
        assert_eq!(Config::resolve_volatile_dir(None, None), None);
    }
}
