//! Configuration file handling for usb-microscope.
//!
//! Loads configuration from `<config dir>/usb-microscope/config.toml` or a
//! custom path. Every key is optional; command-line flags override the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ascii::{CharSet, PreviewOptions};
use crate::camera::Resolution;
use crate::session::{
    MicroscopeSettings, DEFAULT_BUFFER_SIZE, DEFAULT_FPS, DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID,
    DEFAULT_VIDEO_INDEX,
};

/// Default output file for single captures.
pub const DEFAULT_CAPTURE_FILE: &str = "microscope_capture.jpg";

/// Contents written by `config init`.
pub const DEFAULT_CONFIG: &str = r#"# usb-microscope configuration

[device]
# USB ids of the microscope (Genesys Logic USB2.0 Digital Microscope)
vendor_id = 0x05e3
product_id = 0xf12a
# Index of the microscope's video device (see `microscope cameras`)
video_index = 4

[capture]
width = 640
height = 480
fps = 30
# Frames queued by the driver; 1 keeps reads current
buffer_size = 1
output = "microscope_capture.jpg"

[usb]
control_timeout_ms = 1000

[preview]
# standard, blocks, minimal
charset = "standard"
width = 80
height = 30
invert = false
gamma = false

[watch]
interval_ms = 1000
"#;

/// Configuration file structure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub usb: UsbConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub video_index: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            video_index: DEFAULT_VIDEO_INDEX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub buffer_size: u32,
    pub output: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let resolution = Resolution::default();
        Self {
            width: resolution.width,
            height: resolution.height,
            fps: DEFAULT_FPS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            output: PathBuf::from(DEFAULT_CAPTURE_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbConfig {
    pub control_timeout_ms: u64,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            control_timeout_ms: crate::usb::DEFAULT_CONTROL_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub charset: String,
    pub width: u16,
    pub height: u16,
    pub invert: bool,
    pub gamma: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        let options = PreviewOptions::default();
        Self {
            charset: options.charset.name().to_string(),
            width: options.width,
            height: options.height,
            invert: options.invert,
            gamma: options.gamma,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;
        let config = Self::parse(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn microscope_settings(&self) -> MicroscopeSettings {
        MicroscopeSettings {
            vendor_id: self.device.vendor_id,
            product_id: self.device.product_id,
            video_index: self.device.video_index,
            resolution: Resolution {
                width: self.capture.width,
                height: self.capture.height,
            },
            fps: self.capture.fps,
            buffer_size: self.capture.buffer_size,
        }
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.usb.control_timeout_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch.interval_ms)
    }

    /// Preview options; an unknown charset name falls back to the standard ramp.
    pub fn preview_options(&self) -> PreviewOptions {
        let charset = CharSet::from_name(&self.preview.charset).unwrap_or_else(|| {
            log::warn!(
                "Unknown preview charset '{}', using standard",
                self.preview.charset
            );
            CharSet::Standard
        });
        PreviewOptions {
            width: self.preview.width,
            height: self.preview.height,
            charset,
            invert: self.preview.invert,
            gamma: self.preview.gamma,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("usb-microscope")
        .join("config.toml")
}
