//! Configuration management for LcncKit
//!
//! Configuration is organized into logical sections:
//! - Harness settings (settling strategy, consistency threshold, scenarios)
//! - Display settings (refresh period, table rows)
//! - Controller settings (backend selection, simulator tuning)
//!
//! Files are JSON or TOML, chosen by extension.

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use lcnckit_communication::SettleStrategy;
use lcnckit_core::{DEFAULT_DISPLAY_ROWS, MIN_SHARED_FIELDS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the platform config dir
pub const CONFIG_DIR_NAME: &str = "lcnckit";

/// File name of the default configuration
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Verification harness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// How to wait for a command to land before the "after" snapshot
    pub settle: SettleStrategy,
    /// Fields two back-to-back polls must share
    pub min_shared_fields: usize,
    /// Run the two-poll consistency check before the scenarios
    pub check_consistency: bool,
    /// Extra scenarios loaded from a JSON file
    pub scenario_file: Option<PathBuf>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            settle: SettleStrategy::default(),
            min_shared_fields: MIN_SHARED_FIELDS,
            check_consistency: true,
            scenario_file: None,
        }
    }
}

/// Live code display settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Time between polls in milliseconds
    pub refresh_ms: u64,
    /// Rows in the code table
    pub rows: usize,
}

impl DisplaySettings {
    /// Refresh period as a `Duration`
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            refresh_ms: 500,
            rows: DEFAULT_DISPLAY_ROWS,
        }
    }
}

/// Which controller implementation to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerBackend {
    /// In-process simulated controller
    #[default]
    Simulator,
}

impl std::fmt::Display for ControllerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulator => write!(f, "simulator"),
        }
    }
}

/// Controller selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Implementation to drive
    pub backend: ControllerBackend,
    /// Delay before the simulator acts on a command, in milliseconds
    pub response_delay_ms: u64,
}

impl ControllerSettings {
    /// Simulator response delay as a `Duration`
    pub fn response_delay(&self) -> Duration {
        Duration::from_millis(self.response_delay_ms)
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            backend: ControllerBackend::Simulator,
            response_delay_ms: 0,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transition verification settings
    pub harness: HarnessSettings,
    /// Live code display settings
    pub display: DisplaySettings,
    /// Controller selection
    pub controller: ControllerSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location under the platform config directory
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory("no configuration directory on this platform".into())
        })?;
        Ok(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let format = Format::of(path)?;

        let content = match format {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        match self.harness.settle {
            SettleStrategy::PollUntil {
                timeout_ms,
                interval_ms,
                ..
            } => {
                if timeout_ms == 0 {
                    return Err(out_of_range("harness.settle.timeout_ms", timeout_ms));
                }
                if interval_ms == 0 || interval_ms > timeout_ms {
                    return Err(out_of_range("harness.settle.interval_ms", interval_ms));
                }
            }
            SettleStrategy::Fixed { .. } => {}
        }

        if self.harness.min_shared_fields == 0 {
            return Err(out_of_range("harness.min_shared_fields", 0));
        }

        if self.display.refresh_ms == 0 {
            return Err(out_of_range("display.refresh_ms", 0));
        }

        if self.display.rows == 0 {
            return Err(out_of_range("display.rows", 0));
        }

        Ok(())
    }
}

fn out_of_range(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.display.refresh_interval(), Duration::from_millis(500));
        assert_eq!(config.display.rows, 30);
        assert_eq!(config.harness.min_shared_fields, MIN_SHARED_FIELDS);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = Config::new();
        config.harness.settle = SettleStrategy::PollUntil {
            timeout_ms: 100,
            interval_ms: 0,
            grace_ms: 0,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ValueOutOfRange {
                key: "harness.settle.interval_ms".to_string(),
                value: "0".to_string(),
            })
        );
    }

    #[test]
    fn test_fixed_delay_accepts_zero() {
        let mut config = Config::new();
        config.harness.settle = SettleStrategy::Fixed { delay_ms: 0 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_rows_rejected() {
        let mut config = Config::new();
        config.display.rows = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[display]\nrows = 12\n").unwrap();
        assert_eq!(config.display.rows, 12);
        assert_eq!(config.display.refresh_ms, 500);
        assert_eq!(config.harness, HarnessSettings::default());
    }

    #[test]
    fn test_settle_strategy_toml_shape() {
        let text = "[harness.settle]\nmode = \"fixed\"\ndelay_ms = 1000\n";
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.harness.settle, SettleStrategy::Fixed { delay_ms: 1000 });
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::of(Path::new("a.json")), Ok(Format::Json));
        assert_eq!(Format::of(Path::new("a.toml")), Ok(Format::Toml));
        assert!(Format::of(Path::new("a.yaml")).is_err());
        assert!(Format::of(Path::new("config")).is_err());
    }

    #[test]
    fn test_default_path_name() {
        if let Ok(path) = Config::default_path() {
            assert!(path.ends_with("lcnckit/config.toml"));
        }
    }
}
