//! Configuration management (config.toml)
//!
//! Settings are stored in TOML format in the platform-specific config
//! directory. Every section is optional and falls back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::enums::EnumMatchConfig;
use crate::throttle::ThrottleConfig;

/// Inspector configuration.
///
/// Contains all user-configurable settings organized into sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Session timing
    #[serde(default)]
    pub inspector: InspectorConfig,
    /// Event rate limiting
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// Event console
    #[serde(default)]
    pub console: ConsoleConfig,
    /// Enum name matching
    #[serde(default)]
    pub enum_matching: EnumMatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectorConfig {
    /// Periodic reconciliation interval (default: 250)
    #[serde(default = "default_reconcile_interval_ms")]
    pub reconcile_interval_ms: u64,
    /// How long a raw trigger pulse stays active (default: 100)
    #[serde(default = "default_pulse_duration_ms")]
    pub pulse_duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Lines kept in the ring buffer (default: 100)
    #[serde(default = "default_console_capacity")]
    pub capacity: usize,
    /// Status line display time (default: 3000)
    #[serde(default = "default_status_duration_ms")]
    pub status_duration_ms: u64,
}

fn default_reconcile_interval_ms() -> u64 {
    250
}
fn default_pulse_duration_ms() -> u64 {
    100
}

fn default_console_capacity() -> usize {
    100
}
fn default_status_duration_ms() -> u64 {
    3000
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_ms: default_reconcile_interval_ms(),
            pulse_duration_ms: default_pulse_duration_ms(),
        }
    }
}

impl InspectorConfig {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    pub fn pulse_duration(&self) -> Duration {
        Duration::from_millis(self.pulse_duration_ms)
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            capacity: default_console_capacity(),
            status_duration_ms: default_status_duration_ms(),
        }
    }
}

impl ConsoleConfig {
    pub fn status_duration(&self) -> Duration {
        Duration::from_millis(self.status_duration_ms)
    }
}

/// Errors reading or writing a config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\vmscope\config`
/// On macOS: `~/Library/Application Support/io.vmscope.vmscope`
/// On Linux: `~/.config/vmscope`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.vmscope", "", "vmscope")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from disk.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> Config {
    let Some(path) = config_dir().map(|dir| dir.join("config.toml")) else {
        return Config::default();
    };
    if !path.exists() {
        return Config::default();
    }
    match load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Using default configuration: {}", e);
            Config::default()
        }
    }
}

/// Loads a specific config file, reporting why it could not be used.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Saves the configuration to `config.toml` in the config directory,
/// creating the directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    if let Some(dir) = config_dir() {
        save_to(config, &dir.join("config.toml"))?;
    }
    Ok(())
}

pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================================
    // Default value tests
    // =============================================================

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.inspector.reconcile_interval(), Duration::from_millis(250));
        assert_eq!(config.inspector.pulse_duration(), Duration::from_millis(100));
        assert_eq!(config.console.capacity, 100);
        assert_eq!(config.console.status_duration(), Duration::from_secs(3));
        assert_eq!(config.throttle.max_events_per_window, 50);
        assert_eq!(config.throttle.emergency_threshold, 200);
    }

    // =============================================================
    // TOML serialization tests
    // =============================================================

    #[test]
    fn test_config_serialize_roundtrip() {
        let mut config = Config::default();
        config.inspector.reconcile_interval_ms = 500;
        config.throttle.debounce_ms = 20;
        config.enum_matching.min_token_len = 2;

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_deserialize_empty() {
        // Empty TOML should produce defaults
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_deserialize_partial_inspector() {
        let toml_str = r#"
[inspector]
pulse_duration_ms = 40
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.inspector.pulse_duration_ms, 40);
        assert_eq!(config.inspector.reconcile_interval_ms, 250); // default
        assert_eq!(config.console, ConsoleConfig::default());
    }

    #[test]
    fn test_config_deserialize_partial_throttle() {
        let toml_str = r#"
[throttle]
enabled = false
cooldown_ms = 1000
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(!config.throttle.enabled);
        assert_eq!(config.throttle.cooldown_ms, 1000);
        assert_eq!(config.throttle.window_ms, 1000); // default
    }

    // =============================================================
    // File tests
    // =============================================================

    #[test]
    fn test_save_and_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.console.capacity = 10;

        save_to(&config, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_from_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[inspector\nbroken").unwrap();

        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
