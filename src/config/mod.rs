use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod defaults;

use crate::output::OutputFormat;
use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Tables served by the query API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_channels_path")]
    pub channels_path: PathBuf,
    #[serde(default = "default_programs_path")]
    pub programs_path: PathBuf,
    /// IANA zone name used for program start/stop in responses
    #[serde(default = "default_display_timezone")]
    pub display_timezone: String,
}

/// Channel filtering applied while parsing playlists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// Categories to keep; empty keeps every channel
    #[serde(default)]
    pub keep_categories: Vec<String>,
    #[serde(default)]
    pub category_rules: Vec<CategoryRule>,
}

/// Within `category`, keep only channels whose name matches the `name_contains` regex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub name_contains: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Forces a format instead of inferring it from the file extension
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_channels_path() -> PathBuf {
    PathBuf::from(DEFAULT_CHANNELS_PATH)
}

fn default_programs_path() -> PathBuf {
    PathBuf::from(DEFAULT_PROGRAMS_PATH)
}

fn default_display_timezone() -> String {
    DEFAULT_DISPLAY_TIMEZONE.to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            channels_path: default_channels_path(),
            programs_path: default_programs_path(),
            display_timezone: default_display_timezone(),
        }
    }
}

impl Config {
    pub fn load_from_file(config_file: &Path) -> Result<Self> {
        if config_file.exists() {
            let contents = std::fs::read_to_string(config_file)
                .with_context(|| format!("Failed to read {}", config_file.display()))?;
            let config = toml::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", config_file.display()))?;
            info!("Loaded config file: {}", config_file.display());
            Ok(config)
        } else {
            info!(
                "Config file {} not found, using defaults",
                config_file.display()
            );
            Ok(Self::default())
        }
    }
}
