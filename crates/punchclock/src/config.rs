//! Configuration management for punchclock.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::location::{Fix, PositionOptions, FALLBACK_ADDRESS};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "punchclock";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "punchclock.db";

/// Public Nominatim instance.
const DEFAULT_GEOCODING_ENDPOINT: &str = "https://nominatim.openstreetmap.org";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `PUNCHCLOCK_`, sections separated
///    by `__`, e.g. `PUNCHCLOCK_GEOCODING__ENABLED=false`)
/// 2. TOML config file at `~/.config/punchclock/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Position acquisition configuration.
    pub location: LocationConfig,
    /// Reverse geocoding configuration.
    pub geocoding: GeocodingConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/punchclock/punchclock.db`
    pub database_path: Option<PathBuf>,
}

/// Where positions come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSourceKind {
    /// Run `location.command` and parse its JSON output.
    #[default]
    Command,
    /// Report `location.latitude` / `location.longitude`.
    Fixed,
}

/// Position acquisition configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Which position source to use.
    pub source: PositionSourceKind,
    /// Locator command and arguments for the command source.
    pub command: Vec<String>,
    /// Latitude for the fixed source.
    pub latitude: Option<f64>,
    /// Longitude for the fixed source.
    pub longitude: Option<f64>,
    /// Seconds to wait for a fix.
    pub timeout_secs: u64,
    /// Ask for a high-accuracy fix.
    pub high_accuracy: bool,
    /// Oldest cached fix accepted, in seconds. 0 means always fresh.
    pub maximum_age_secs: u64,
}

/// Reverse geocoding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Resolve addresses at all. When off, every record gets the fallback.
    pub enabled: bool,
    /// Base URL of a Nominatim-compatible service.
    pub endpoint: String,
    /// Preferred language of returned addresses.
    pub language: String,
    /// User agent sent with every lookup.
    pub user_agent: String,
    /// Seconds to wait for a lookup.
    pub timeout_secs: u64,
    /// Address recorded when a lookup fails.
    pub fallback_address: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            source: PositionSourceKind::Command,
            command: vec![
                "termux-location".to_string(),
                "-p".to_string(),
                "gps".to_string(),
                "-r".to_string(),
                "once".to_string(),
            ],
            latitude: None,
            longitude: None,
            timeout_secs: 10,
            high_accuracy: true,
            maximum_age_secs: 0,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_GEOCODING_ENDPOINT.to_string(),
            language: "ja".to_string(),
            user_agent: format!("punchclock/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 5,
            fallback_address: FALLBACK_ADDRESS.to_string(),
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
            .merge(Env::prefixed("PUNCHCLOCK_").split("__"));

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
        if self.location.timeout_secs == 0 {
            return Err(invalid("location.timeout_secs must be greater than 0"));
        }

        if self.geocoding.timeout_secs == 0 {
            return Err(invalid("geocoding.timeout_secs must be greater than 0"));
        }

        match self.location.source {
            PositionSourceKind::Command if self.location.command.is_empty() => {
                return Err(invalid(
                    "location.command must not be empty when location.source is \"command\"",
                ));
            }
            PositionSourceKind::Fixed
                if self.location.latitude.is_none() != self.location.longitude.is_none() =>
            {
                return Err(invalid(
                    "location.latitude and location.longitude must be set together",
                ));
            }
            _ => {}
        }

        if let Some(latitude) = self.location.latitude {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(invalid(format!(
                    "location.latitude must be within [-90, 90], got {latitude}"
                )));
            }
        }

        if let Some(longitude) = self.location.longitude {
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(invalid(format!(
                    "location.longitude must be within [-180, 180], got {longitude}"
                )));
            }
        }

        if self.geocoding.enabled {
            match reqwest::Url::parse(&self.geocoding.endpoint) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => {
                    return Err(invalid(format!(
                        "geocoding.endpoint is not an http(s) URL: {}",
                        self.geocoding.endpoint
                    )));
                }
            }
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

    /// Options for each position request.
    #[must_use]
    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: self.location.high_accuracy,
            timeout: Duration::from_secs(self.location.timeout_secs),
            maximum_age: Duration::from_secs(self.location.maximum_age_secs),
        }
    }

    /// The configured static position, if both coordinates are set.
    #[must_use]
    pub fn fixed_position(&self) -> Option<Fix> {
        match (self.location.latitude, self.location.longitude) {
            (Some(latitude), Some(longitude)) => Some(Fix {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    /// Get the geocoding timeout as a Duration.
    #[must_use]
    pub fn geocode_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoding.timeout_secs)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
