//! Slotbridge configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bridge::BridgeOptions;
use crate::domain::PeriodIndex;
use crate::events::DEFAULT_CHANNEL_CAPACITY;
use crate::exchange::DEFAULT_RETENTION_WINDOW;

/// Main slotbridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level used when no `--log-level` flag is given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Periods kept behind the most recent drain
    #[serde(rename = "retention-window")]
    pub retention_window: PeriodIndex,

    /// Default bound on blocking waits; unset blocks indefinitely
    #[serde(rename = "wait-timeout-ms")]
    pub wait_timeout_ms: Option<u64>,

    /// Gateway socket
    #[serde(rename = "socket-path")]
    pub socket_path: PathBuf,

    /// Event journal root; unset disables the journal
    #[serde(rename = "journal-dir")]
    pub journal_dir: Option<PathBuf>,

    /// Event bus capacity
    #[serde(rename = "event-capacity")]
    pub event_capacity: usize,

    /// Length of one delay probe cycle
    #[serde(rename = "delay-probe-ms")]
    pub delay_probe_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            retention_window: DEFAULT_RETENTION_WINDOW,
            wait_timeout_ms: None,
            socket_path: default_socket_path(),
            journal_dir: None,
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
            delay_probe_ms: 2000,
        }
    }
}

/// Default gateway socket location
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("slotbridge")
        .join("bridge.sock")
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.retention_window < 0 {
            return Err(eyre::eyre!(
                "retention-window must not be negative (got {})",
                self.retention_window
            ));
        }
        if self.event_capacity == 0 {
            return Err(eyre::eyre!("event-capacity must be greater than zero"));
        }
        Ok(())
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    pub fn delay_probe(&self) -> Duration {
        Duration::from_millis(self.delay_probe_ms)
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            retention: self.retention_window,
            wait_timeout: self.wait_timeout(),
        }
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local: .slotbridge.yml
        let local_config = PathBuf::from(".slotbridge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User: ~/.config/slotbridge/slotbridge.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("slotbridge").join("slotbridge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.retention_window, 3);
        assert_eq!(config.wait_timeout(), None);
        assert_eq!(config.event_capacity, 1024);
        assert_eq!(config.delay_probe(), Duration::from_secs(2));
        assert!(config.socket_path.ends_with("slotbridge/bridge.sock"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug
retention-window: 5
wait-timeout-ms: 30000
socket-path: /tmp/sb-test.sock
journal-dir: /tmp/sb-journal
event-capacity: 64
delay-probe-ms: 10
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.retention_window, 5);
        assert_eq!(config.wait_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.socket_path, PathBuf::from("/tmp/sb-test.sock"));
        assert_eq!(config.journal_dir, Some(PathBuf::from("/tmp/sb-journal")));
        assert_eq!(config.event_capacity, 64);
        assert_eq!(config.delay_probe_ms, 10);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("retention-window: 1\n").unwrap();

        assert_eq!(config.retention_window, 1);
        assert_eq!(config.event_capacity, 1024);
        assert_eq!(config.journal_dir, None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let negative = Config {
            retention_window: -1,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let zero_capacity = Config {
            event_capacity: 0,
            ..Default::default()
        };
        assert!(zero_capacity.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "wait-timeout-ms: 250").unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.wait_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.bridge_options().wait_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let missing = PathBuf::from("/nonexistent/slotbridge.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
