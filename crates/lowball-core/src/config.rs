//! Configuration management for lowball.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/lowball/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scrape job timing and concurrency
    pub scraping: ScrapingConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Result store settings
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, using defaults if it is missing.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `LOWBALL_MAX_CONCURRENCY`: Override the number of concurrent page visits
    /// - `LOWBALL_MAX_RETRIES`: Override the retry budget per marketplace
    /// - `LOWBALL_HEADLESS`: Override browser headless mode (true/false)
    /// - `LOWBALL_DATABASE_PATH`: Override the result store location
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `LOWBALL_*` environment overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LOWBALL_MAX_CONCURRENCY") {
            if let Ok(max) = val.parse() {
                self.scraping.max_concurrency = max;
                tracing::debug!("Override scraping.max_concurrency from env: {}", max);
            }
        }

        if let Ok(val) = std::env::var("LOWBALL_MAX_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.scraping.max_retries = retries;
                tracing::debug!("Override scraping.max_retries from env: {}", retries);
            }
        }

        if let Ok(val) = std::env::var("LOWBALL_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("LOWBALL_DATABASE_PATH") {
            tracing::debug!("Override storage.database_path from env: {}", val);
            self.storage.database_path = Some(PathBuf::from(val));
        }
    }

    /// Check value constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scraping.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scraping.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scraping.per_attempt_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scraping.per_attempt_timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scraping.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scraping.poll_interval_ms".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/lowball/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/lowball`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Resolve the result store path, defaulting to `<data_dir>/prices.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("prices.db")),
        }
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "lowball", "lowball").ok_or(ConfigError::NoConfigDir)
}

/// Scrape job timing, retry and concurrency settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Number of marketplace pages visited at once
    pub max_concurrency: usize,
    /// Extraction deadline for one attempt, in seconds
    pub per_attempt_timeout_secs: u64,
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// DOM polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Page load timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Result store append timeout in seconds
    pub persistence_timeout_secs: u64,
}

impl ScrapingConfig {
    /// Extraction deadline for one attempt.
    #[must_use]
    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.per_attempt_timeout_secs)
    }

    /// DOM polling interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Page load timeout.
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    /// Result store append timeout.
    #[must_use]
    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_secs(self.persistence_timeout_secs)
    }
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            per_attempt_timeout_secs: 10,
            max_retries: 3,
            poll_interval_ms: 500,
            navigation_timeout_secs: 30,
            persistence_timeout_secs: 5,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Explicit Chrome/Chromium executable, auto-detected when unset
    pub chrome_executable: Option<PathBuf>,
    /// User agent override
    pub user_agent: Option<String>,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            user_agent: None,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// Result store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database file; `<data_dir>/prices.db` when unset
    pub database_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scraping.max_concurrency, 4);
        assert_eq!(config.scraping.max_retries, 3);
        assert_eq!(config.scraping.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.scraping.per_attempt_timeout(), Duration::from_secs(10));
        assert!(config.browser.headless);
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[scraping]"));
        assert!(toml_str.contains("[browser]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.scraping.max_retries, config.scraping.max_retries);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.scraping.max_concurrency = 8;
        config.storage.database_path = Some(tmp.path().join("prices.db"));

        config.save_to(&config_path).expect("save config");
        let loaded = AppConfig::load_from(&config_path).expect("load config");

        assert_eq!(loaded.scraping.max_concurrency, 8);
        assert_eq!(
            loaded.database_path().expect("database path"),
            tmp.path().join("prices.db")
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load defaults");
        assert_eq!(loaded.scraping.max_concurrency, 4);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[scraping]\nmax_concurrency = 0\n").expect("write config file");

        let result = AppConfig::load_from(&config_path);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[scraping]
max_retries = 1

[browser]
headless = false
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.scraping.max_retries, 1);
        assert!(!config.browser.headless);
        // These should be defaults
        assert_eq!(config.scraping.max_concurrency, 4);
        assert_eq!(config.scraping.navigation_timeout_secs, 30);
    }
}
