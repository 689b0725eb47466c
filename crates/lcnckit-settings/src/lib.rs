//! LcncKit Settings Crate
//!
//! Handles harness, display and controller configuration stored as JSON or
//! TOML in the platform configuration directory.

pub mod config;
pub mod error;

pub use config::{Config, ControllerBackend, ControllerSettings, DisplaySettings, HarnessSettings};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
