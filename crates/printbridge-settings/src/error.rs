//! Settings errors
//!
//! [`SettingsError`] covers reading, writing and decoding a config file.
//! [`ConfigError`] holds the failures that come from the file's contents
//! rather than from the filesystem.

use std::io;
use thiserror::Error;

/// Failure to read, write or accept a config file
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Reading the file failed; carries the path and the cause
    #[error("Cannot read config {0}")]
    LoadError(String),

    /// Writing the file failed; carries the path and the cause
    #[error("Cannot write config {0}")]
    SaveError(String),

    /// A value decoded fine but is unusable, keyed by its dotted path
    #[error("Bad value for {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    /// The platform reports no config directory
    #[error("No config directory: {0}")]
    ConfigDirectory(String),

    #[error(transparent)]
    IoError(#[from] io::Error),

    #[error("Malformed JSON config: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Malformed TOML config: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Problems with what a config file says
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Extension other than `.toml` or `.json`
    #[error("Config files must end in .toml or .json, not {0}")]
    UnsupportedFormat(String),

    /// Numeric value outside what the streaming layer accepts
    #[error("{key} = {value} is out of range")]
    ValueOutOfRange { key: String, value: String },
}

/// Result of a settings operation
pub type SettingsResult<T> = Result<T, SettingsError>;
