//! Configuration management for voxquery
//!
//! Sources, lowest priority first: built-in defaults, the TOML file at
//! `~/.config/voxquery/config.toml`, then `VOXQUERY_*` environment
//! variables. Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::query::DEFAULT_ENDPOINT;
use crate::voice::SAMPLE_RATE;
use crate::{Error, Result};

/// Server queried when nothing else is configured
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the query server
    pub server_url: String,

    /// Query endpoint: a path resolved against `server_url`, or an absolute URL
    pub endpoint: String,

    /// Microphone capture configuration
    pub capture: CaptureConfig,

    /// Reply playback configuration
    pub playback: PlaybackConfig,
}

/// Microphone capture configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Recording sample rate in Hz
    pub sample_rate: u32,
}

/// Reply playback configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Play reply audio at all
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            capture: CaptureConfig {
                sample_rate: SAMPLE_RATE,
            },
            playback: PlaybackConfig { enabled: true },
        }
    }
}

/// Top-level TOML configuration file schema
///
/// All fields are optional; the file is a partial overlay on the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerFileConfig,

    #[serde(default)]
    pub capture: CaptureFileConfig,

    #[serde(default)]
    pub playback: PlaybackFileConfig,
}

/// `[server]` table
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub url: Option<String>,
    pub endpoint: Option<String>,
}

/// `[capture]` table
#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    pub sample_rate: Option<u32>,
}

/// `[playback]` table
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackFileConfig {
    pub enabled: Option<bool>,
}

impl Config {
    /// Load configuration from the config file and process environment
    #[must_use]
    pub fn load() -> Self {
        Self::from_sources(load_config_file(), |key| std::env::var(key).ok())
    }

    /// Merge defaults, a parsed config file and an environment lookup
    pub fn from_sources(file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = file.server.url {
            config.server_url = url;
        }
        if let Some(endpoint) = file.server.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(rate) = file.capture.sample_rate {
            config.capture.sample_rate = rate;
        }
        if let Some(enabled) = file.playback.enabled {
            config.playback.enabled = enabled;
        }

        if let Some(url) = env("VOXQUERY_SERVER_URL") {
            config.server_url = url;
        }
        if let Some(endpoint) = env("VOXQUERY_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(raw) = env("VOXQUERY_SAMPLE_RATE") {
            match raw.parse() {
                Ok(rate) => config.capture.sample_rate = rate,
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring VOXQUERY_SAMPLE_RATE"),
            }
        }
        if let Some(raw) = env("VOXQUERY_PLAYBACK") {
            config.playback.enabled = !(raw == "0" || raw.eq_ignore_ascii_case("false"));
        }

        config
    }

    /// Resolve the query endpoint to an absolute URL
    ///
    /// # Errors
    ///
    /// Returns error if the server URL or endpoint is not a valid URL
    pub fn query_url(&self) -> Result<Url> {
        if let Ok(url) = Url::parse(&self.endpoint) {
            return Ok(url);
        }

        let base = Url::parse(&self.server_url).map_err(|e| {
            Error::Config(format!("invalid server url {:?}: {e}", self.server_url))
        })?;
        Ok(base.join(&self.endpoint)?)
    }
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/voxquery/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voxquery").join("config.toml"))
}
