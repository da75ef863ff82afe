//! Configuration file handling for PrintBridge
//!
//! Supports JSON and TOML files. The default location is
//! `<platform config dir>/printbridge/config.toml`.
//!
//! Configuration is organized into sections:
//! - Connection (serial port and baud rate)
//! - Streaming (line numbering, reply handling, flow control)
//! - Upload defaults

use crate::error::{ConfigError, SettingsError, SettingsResult};
use printbridge_communication::{SerialParams, StreamConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name used inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Upload defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Start printing once the upload completes
    pub print_after_upload: bool,
    /// Bytes read from the source file per write
    pub chunk_size: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            print_after_upload: false,
            chunk_size: 512,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial connection; an empty port means "give it on the command line"
    pub connection: SerialParams,
    /// Streaming behavior
    pub streaming: StreamConfig,
    /// Upload defaults
    pub upload: UploadSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )
            .into()),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file path under the platform config directory
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("printbridge").join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no config directory on this platform".to_string())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load config from `path`, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)
                .map_err(|e| SettingsError::SaveError(e.to_string()))?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.connection.baud_rate == 0 {
            return Err(invalid("connection.baud_rate", "must be > 0"));
        }

        let numbering = &self.streaming.numbering;
        if numbering.max_line_number == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "streaming.numbering.max_line_number".to_string(),
                value: numbering.max_line_number.to_string(),
            }
            .into());
        }

        if self.streaming.link.max_line_length == 0 {
            return Err(invalid("streaming.link.max_line_length", "must be > 0"));
        }

        self.streaming
            .flow_control
            .validate()
            .map_err(|e| invalid("streaming.flow_control", &e.to_string()))?;

        if self.upload.chunk_size == 0 {
            return Err(invalid("upload.chunk_size", "must be > 0"));
        }

        Ok(())
    }

    /// Serial parameters, with `port` and `baud_rate` overriding the file
    pub fn serial_params(&self, port: Option<&str>, baud_rate: Option<u32>) -> SerialParams {
        SerialParams {
            port: port.map_or_else(|| self.connection.port.clone(), str::to_string),
            baud_rate: baud_rate.unwrap_or(self.connection.baud_rate),
        }
    }
}

fn invalid(key: &str, reason: &str) -> SettingsError {
    SettingsError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
