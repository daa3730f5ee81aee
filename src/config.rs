// Configuration management
//
// Runtime configuration of the runner, read from a TOML file. Every section
// and field has a default, so a partial file is valid.

use crate::emulator::Region;
use crate::netplay::Role;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file path
pub const CONFIG_FILE: &str = "nes_runner.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Runner configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub system: SystemConfig,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub netplay: NetplayConfig,
    pub paths: PathsConfig,
    pub log: LogConfig,
}

/// Emulated system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub region: Region,
}

/// Video configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Window scale (1-4)
    pub scale: u32,

    /// Enable VSync
    pub vsync: bool,

    /// Smooth the auto-crop decision over several frames
    pub crop_smoothing: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            scale: 3,
            vsync: true,
            crop_smoothing: false,
        }
    }
}

/// Audio configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Play through the sound card; otherwise pace with a timer
    pub enabled: bool,

    /// Output sample rate in Hz
    pub sample_rate: u32,

    /// Device buffer length in milliseconds
    pub buffer_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 32000,
            buffer_ms: 50,
        }
    }
}

/// Netplay mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetplayMode {
    #[default]
    Off,
    Host,
    Guest,
}

impl NetplayMode {
    /// Session role, or `None` when netplay is off
    pub fn role(self) -> Option<Role> {
        match self {
            NetplayMode::Off => None,
            NetplayMode::Host => Some(Role::Host),
            NetplayMode::Guest => Some(Role::Guest),
        }
    }
}

/// Netplay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetplayConfig {
    pub mode: NetplayMode,

    /// Listen address (host) or host address (guest)
    pub address: String,

    /// Connect and per-frame exchange timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for NetplayConfig {
    fn default() -> Self {
        Self {
            mode: NetplayMode::Off,
            address: "0.0.0.0:5400".to_string(),
            timeout_ms: 5000,
        }
    }
}

/// File locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Persisted user settings (palette, crop, overscan, sprite limit)
    pub settings_file: PathBuf,

    pub save_directory: PathBuf,

    pub screenshot_directory: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            settings_file: PathBuf::from("nes_settings.toml"),
            save_directory: PathBuf::from("saves"),
            screenshot_directory: PathBuf::from("screenshots"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from `path` or create default
    ///
    /// If the file doesn't exist, the default configuration is written to it.
    /// A file that cannot be parsed is left alone and defaults are used.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            // Try to save the default config, but don't fail if we can't
            if let Err(e) = config.save(path) {
                tracing::warn!("cannot write default config {}: {}", path.display(), e);
            }
            return config;
        }

        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("ignoring {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
