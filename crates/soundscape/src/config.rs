//! Configuration management for soundscape.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::upload::AudioFormat;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "soundscape";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "sounds.db";

/// Default uploads directory name (inside the data directory).
const UPLOADS_DIR_NAME: &str = "uploads";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SOUNDSCAPE_`, sections split on `__`,
///    e.g. `SOUNDSCAPE_SERVER__BIND`)
/// 2. TOML config file at `~/.config/soundscape/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Audio upload configuration.
    pub upload: UploadConfig,
    /// Analytics configuration.
    pub analytics: AnalyticsConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/soundscape/sounds.db`
    pub database_path: Option<PathBuf>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the API listens on.
    pub bind: String,
    /// Origin allowed by CORS (the browser front end).
    pub frontend_url: String,
}

/// Audio upload configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory where uploaded audio is stored.
    /// Defaults to `~/.local/share/soundscape/uploads`
    pub dir: Option<PathBuf>,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: u64,
    /// Accepted file extensions.
    pub allowed_extensions: Vec<String>,
}

/// Analytics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Number of days covered by the activity histogram.
    pub timeline_days: u32,
    /// Number of emotions kept in the emotion chart.
    pub top_emotions: usize,
    /// Number of location buckets kept in the location chart.
    pub top_locations: usize,
    /// Decimal places used when bucketing coordinates.
    pub location_precision: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: None, // Resolved to the data directory at runtime
            max_upload_bytes: 50 * 1024 * 1024,
            allowed_extensions: AudioFormat::ALL
                .iter()
                .map(|f| f.extension().to_string())
                .collect(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            timeline_days: 30,
            top_emotions: 8,
            top_locations: 6,
            location_precision: 1,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("SOUNDSCAPE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!("server.bind is not a socket address: {}", self.server.bind),
            });
        }

        if self.upload.max_upload_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "max_upload_bytes must be greater than 0".to_string(),
            });
        }

        if self.upload.allowed_extensions.is_empty() {
            return Err(Error::ConfigValidation {
                message: "allowed_extensions cannot be empty".to_string(),
            });
        }

        for ext in &self.upload.allowed_extensions {
            if AudioFormat::from_extension(ext).is_none() {
                return Err(Error::ConfigValidation {
                    message: format!("unsupported audio extension: {ext}"),
                });
            }
        }

        if self.analytics.timeline_days == 0 {
            return Err(Error::ConfigValidation {
                message: "timeline_days must be greater than 0".to_string(),
            });
        }

        if self.analytics.top_emotions == 0 || self.analytics.top_locations == 0 {
            return Err(Error::ConfigValidation {
                message: "top_emotions and top_locations must be greater than 0".to_string(),
            });
        }

        if self.analytics.location_precision > 6 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "location_precision ({}) cannot exceed 6",
                    self.analytics.location_precision
                ),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the uploads directory, resolving defaults if not set.
    #[must_use]
    pub fn upload_dir(&self) -> PathBuf {
        self.upload
            .dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(UPLOADS_DIR_NAME))
    }

    /// Get the accepted audio formats.
    #[must_use]
    pub fn allowed_formats(&self) -> Vec<AudioFormat> {
        self.upload
            .allowed_extensions
            .iter()
            .filter_map(|ext| AudioFormat::from_extension(ext))
            .collect()
    }

    /// Get the server bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address cannot be parsed.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind.parse().map_err(|_| Error::ConfigValidation {
            message: format!("server.bind is not a socket address: {}", self.server.bind),
        })
    }
}
