//! Configuration model.

use super::safety::{SafetyLevel, SafetyProfile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of intents accepted in one batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Safety configuration.
    pub safety: SafetyConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Safety configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Profile to run with.
    pub level: SafetyLevel,
    /// Prefixes forbidden in addition to the profile's own.
    pub extra_forbidden_paths: Vec<PathBuf>,
    /// Maximum number of intents in one batch.
    pub max_batch_size: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the `ocd` target when not running verbose.
    pub level: String,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            level: SafetyLevel::default(),
            extra_forbidden_paths: Vec::new(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Build the safety profile this configuration selects.
    pub fn safety_profile(&self) -> SafetyProfile {
        SafetyProfile::for_level(self.safety.level)
            .with_forbidden_prefixes(self.safety.extra_forbidden_paths.iter().cloned())
    }

    /// Apply `OCD_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(level) = std::env::var("OCD_SAFETY_LEVEL") {
            match level.parse() {
                Ok(level) => self.safety.level = level,
                Err(e) => tracing::warn!("Ignoring OCD_SAFETY_LEVEL: {}", e),
            }
        }
    }
}

/// Get the configuration directory path.
pub fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocd")
}

/// Load configuration from the default location.
pub fn load_config() -> Config {
    let mut config = load_config_from(&dirs_config_path().join("config.toml"));
    config.apply_env();
    config
}

/// Load configuration from a file, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Invalid config {:?}, using defaults: {}", path, e);
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!("Cannot read config {:?}, using defaults: {}", path, e);
            Config::default()
        }
    }
}
