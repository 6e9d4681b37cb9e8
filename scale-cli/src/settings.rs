//! Tool settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use scale_detect::{default_candidates, ProbeConfig, ReadTiming, SerialConfig, StrategyConfig, ENQ};
use scale_protocol::DecoderConfig;
use scale_session::{PollConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Settings read from `settings.json`
///
/// Every field has a default, so a partial file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Serial configurations to probe, highest priority first
    pub candidates: Vec<SerialConfig>,
    /// Request strings sent to elicit a reading, in order
    pub commands: Vec<String>,
    /// Minimum digits for a bare integer to count as grams
    pub gram_min_digits: usize,
    /// Pause after opening a port (ms)
    pub settle_ms: u64,
    /// Wait after each request before reading the reply (ms)
    pub command_settle_ms: u64,
    /// How long to listen for unrequested output (ms)
    pub passive_timeout_ms: u64,
    /// Pause between passive checks (ms)
    pub passive_interval_ms: u64,
    /// Pause between continuous reads (ms)
    pub poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let timing = ReadTiming::default();
        Self {
            candidates: default_candidates(),
            commands: vec![
                "P\r\n".to_string(),
                "W\r\n".to_string(),
                "S\r\n".to_string(),
                char::from(ENQ).to_string(),
            ],
            gram_min_digits: DecoderConfig::default().gram_min_digits,
            settle_ms: 500,
            command_settle_ms: timing.command_settle.as_millis() as u64,
            passive_timeout_ms: timing.passive_timeout.as_millis() as u64,
            passive_interval_ms: timing.passive_interval.as_millis() as u64,
            poll_interval_ms: 300,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for scalectl
    /// Uses $XDG_CONFIG_HOME/scalectl, falls back to ~/.config/scalectl
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("scalectl"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("scalectl"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk
    ///
    /// A missing file gives the defaults silently; an unreadable one gives the
    /// defaults with a warning.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Self::default();
        }

        Self::read_from(&path).unwrap_or_else(|e| {
            warn!("Ignoring settings: {:#}", e);
            Self::default()
        })
    }

    /// Parse a settings file
    pub fn read_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(settings)
    }

    /// Connection manager settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            probe: ProbeConfig {
                candidates: self.candidates.clone(),
                settle: Duration::from_millis(self.settle_ms),
            },
            strategy: StrategyConfig {
                commands: self
                    .commands
                    .iter()
                    .map(|c| c.as_bytes().to_vec())
                    .collect(),
                timing: ReadTiming {
                    command_settle: Duration::from_millis(self.command_settle_ms),
                    passive_timeout: Duration::from_millis(self.passive_timeout_ms),
                    passive_interval: Duration::from_millis(self.passive_interval_ms),
                },
                decoder: DecoderConfig {
                    gram_min_digits: self.gram_min_digits,
                },
            },
        }
    }

    /// Continuous read settings
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use scale_detect::default_commands;

    use super::*;

    #[test]
    fn test_defaults_match_library_defaults() {
        let config = Settings::default().session_config();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.strategy.commands, default_commands());
        assert_eq!(Settings::default().poll_config(), PollConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"gram_min_digits": 4, "poll_interval_ms": 1000}"#).unwrap();
        assert_eq!(settings.gram_min_digits, 4);
        assert_eq!(settings.poll_config().interval, Duration::from_secs(1));
        assert_eq!(settings.candidates, default_candidates());
    }

    #[test]
    fn test_candidates_use_serial_field_names() {
        let settings: Settings = serde_json::from_str(
            r#"{"candidates": [{"baudrate": 1200, "bytesize": 7, "parity": "O", "stopbits": 2, "timeout": 0.5}]}"#,
        )
        .unwrap();
        let candidate = settings.candidates[0];
        assert_eq!(candidate.baud_rate, 1200);
        assert_eq!(candidate.to_string(), "1200-7-O-2");
        assert_eq!(candidate.read_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_read_from_reports_bad_json() {
        let path = std::env::temp_dir().join(format!("scalectl-settings-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let err = Settings::read_from(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(err.to_string().contains("failed to parse"));
    }
}
