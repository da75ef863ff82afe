//! PrintBridge Settings Crate
//!
//! Loads, validates and saves the configuration file used by the
//! `printbridge` binary.

pub mod config;
pub mod error;

pub use config::{Config, UploadSettings, CONFIG_FILE_NAME};
pub use error::{ConfigError, SettingsError, SettingsResult};
