//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Encoder settings shared by every pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderConfig {
    /// Encoder thread count (0 = derive from logical cores)
    #[serde(default)]
    pub threads: u32,
    /// libvpx deadline used for the final pass (default "best")
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Video codec handed to `-c:v`
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    /// Audio codec handed to `-c:a`
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    /// Output container; also the default output extension
    #[serde(default = "default_container")]
    pub container: String,
}

fn default_quality() -> String {
    "best".to_string()
}

fn default_video_codec() -> String {
    "libvpx-vp9".to_string()
}

fn default_audio_codec() -> String {
    "libopus".to_string()
}

fn default_container() -> String {
    "webm".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            quality: default_quality(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            container: default_container(),
        }
    }
}

/// Prototype (single-pass CRF preview) settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrototypeConfig {
    /// Constant rate factor for preview encodes (default 30)
    #[serde(default = "default_prototype_crf")]
    pub crf: u32,
}

fn default_prototype_crf() -> u32 {
    30
}

impl Default for PrototypeConfig {
    fn default() -> Self {
        Self {
            crf: default_prototype_crf(),
        }
    }
}

/// External process lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessConfig {
    /// Seconds to wait for the encoder to stop after an interrupt before killing it
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// Locations of the external tools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub prototype: PrototypeConfig,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use the built-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}
