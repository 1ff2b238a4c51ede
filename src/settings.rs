use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::machine::DEFAULT_LOW_TIME_THRESHOLD;

/// Application settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub bank: BankSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Exam session settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    /// Length of one countdown step (milliseconds)
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,

    /// Give up on loading the quiz after this long (seconds)
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,

    /// Remaining seconds at which the countdown is flagged as low
    #[serde(default = "default_low_time_threshold")]
    pub low_time_threshold: u32,

    /// Fixed seed for the question order (testing and demos)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shuffle_seed: Option<u64>,
}

/// Quiz bank settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BankSettings {
    /// Quiz bank file (defaults to the user data directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Artificial delay on every lookup (milliseconds)
    #[serde(default)]
    pub simulated_latency_millis: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_tick_millis() -> u64 {
    1000 // 1 second
}

fn default_load_timeout() -> u64 {
    10
}

fn default_low_time_threshold() -> u32 {
    DEFAULT_LOW_TIME_THRESHOLD
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
            load_timeout_secs: default_load_timeout(),
            low_time_threshold: default_low_time_threshold(),
            shuffle_seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SessionSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

impl BankSettings {
    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_millis)
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Load settings if the file exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let toml = toml::to_string_pretty(self).context("Failed to serialize settings")?;

        crate::platform::common::atomic_write(path, toml.as_bytes())
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;

        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.session.tick_millis == 0 {
            anyhow::bail!("session.tick_millis must be greater than 0");
        }

        if self.session.load_timeout_secs == 0 {
            anyhow::bail!("session.load_timeout_secs must be greater than 0");
        }

        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            anyhow::bail!("Invalid logging.level: {}", self.logging.level);
        }

        Ok(())
    }
}

/// Default settings file location
pub fn get_settings_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "quickquest")
        .context("Could not determine config directory")?;

    let mut path = dirs.config_dir().to_path_buf();
    path.push("settings.toml");
    Ok(path)
}
