//! Location acquisition and address resolution.
//!
//! A [`LocationResolver`] asks a [`PositionSource`] for a fresh fix and then
//! asks a [`ReverseGeocoder`] for a display address. Acquiring the fix is
//! mandatory and every failure aborts with a [`LocationError`]; resolving the
//! address is best-effort and falls back to a fixed string.

pub mod geocode;
pub mod source;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, PositionSourceKind};

pub use geocode::{DisabledGeocoder, GeocodeError, NominatimGeocoder};
pub use source::{CommandPositionSource, FixedPositionSource};

/// Address used when reverse geocoding yields nothing usable.
pub const FALLBACK_ADDRESS: &str = "Address unavailable";

/// Errors raised while acquiring a device position.
///
/// The variants mirror the W3C geolocation error codes, plus a catch-all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user or the platform refused access to the position.
    #[error("location permission denied: {0}")]
    PermissionDenied(String),

    /// The device could not determine its position.
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),

    /// No fix arrived within the allowed time.
    #[error("timed out acquiring position after {0:?}")]
    Timeout(Duration),

    /// Any other failure of the position source.
    #[error("unknown location error: {0}")]
    Unknown(String),
}

impl LocationError {
    /// Map a W3C geolocation error code to an error.
    ///
    /// `1` is permission denied, `2` position unavailable, `3` timeout; any
    /// other code is unknown.
    #[must_use]
    pub fn from_code(code: i32, message: impl Into<String>, timeout: Duration) -> Self {
        let message = message.into();
        match code {
            1 => Self::PermissionDenied(message),
            2 => Self::PositionUnavailable(message),
            3 => Self::Timeout(timeout),
            _ => Self::Unknown(format!("code {code}: {message}")),
        }
    }
}

/// A single raw reading from the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Fix {
    /// Check that both coordinates are finite and in range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A resolved position with its display address.
///
/// Immutable once attached to an attendance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Human-readable address, or the fallback string.
    pub address: String,
}

/// Options passed to the device when requesting a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Prefer a high-accuracy fix (GPS) over a coarse one.
    pub high_accuracy: bool,
    /// How long to wait for a fix.
    pub timeout: Duration,
    /// Oldest cached fix that may be returned. Zero means always fresh.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::ZERO,
        }
    }
}

/// A source of raw device positions.
#[async_trait::async_trait]
pub trait PositionSource: Send + Sync + std::fmt::Debug {
    /// The name of this source (for logging).
    fn name(&self) -> &'static str;

    /// Request a single fix.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`] describing why no fix was produced.
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> std::result::Result<Fix, LocationError>;
}

/// Turns coordinates into a display address.
#[async_trait::async_trait]
pub trait ReverseGeocoder: Send + Sync + std::fmt::Debug {
    /// Look up a display name for the given fix.
    ///
    /// `Ok(None)` means the service answered but had no usable name.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself failed.
    async fn display_name(&self, fix: Fix) -> std::result::Result<Option<String>, GeocodeError>;
}

/// Acquires a fix and resolves it to a [`Location`].
#[derive(Debug, Clone)]
pub struct LocationResolver {
    source: Arc<dyn PositionSource>,
    geocoder: Arc<dyn ReverseGeocoder>,
    options: PositionOptions,
    fallback_address: String,
}

impl LocationResolver {
    /// Create a resolver with default options and the default fallback address.
    #[must_use]
    pub fn new(source: Arc<dyn PositionSource>, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self {
            source,
            geocoder,
            options: PositionOptions::default(),
            fallback_address: FALLBACK_ADDRESS.to_string(),
        }
    }

    /// Build the resolver described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client for geocoding cannot be built.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let source: Arc<dyn PositionSource> = match config.location.source {
            PositionSourceKind::Command => {
                Arc::new(CommandPositionSource::from_argv(&config.location.command)?)
            }
            PositionSourceKind::Fixed => {
                Arc::new(FixedPositionSource::new(config.fixed_position()))
            }
        };

        let geocoder: Arc<dyn ReverseGeocoder> = if config.geocoding.enabled {
            Arc::new(
                NominatimGeocoder::new(
                    &config.geocoding.endpoint,
                    &config.geocoding.language,
                    &config.geocoding.user_agent,
                    config.geocode_timeout(),
                )
                .map_err(|e| crate::Error::internal(e.to_string()))?,
            )
        } else {
            Arc::new(DisabledGeocoder)
        };

        Ok(Self::new(source, geocoder)
            .with_options(config.position_options())
            .with_fallback_address(config.geocoding.fallback_address.clone()))
    }

    /// Replace the position options.
    #[must_use]
    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the fallback address.
    #[must_use]
    pub fn with_fallback_address(mut self, address: impl Into<String>) -> Self {
        self.fallback_address = address.into();
        self
    }

    /// The options used for each fix request.
    #[must_use]
    pub fn options(&self) -> &PositionOptions {
        &self.options
    }

    /// The address substituted when geocoding fails.
    #[must_use]
    pub fn fallback_address(&self) -> &str {
        &self.fallback_address
    }

    /// Acquire a fresh fix and resolve its address.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`] if no fix could be acquired. Geocoding
    /// failures never surface here.
    pub async fn acquire(&self) -> std::result::Result<Location, LocationError> {
        let fix = self.fix().await?;
        let address = self.resolve_address(fix).await;

        Ok(Location {
            latitude: fix.latitude,
            longitude: fix.longitude,
            address,
        })
    }

    async fn fix(&self) -> std::result::Result<Fix, LocationError> {
        debug!(
            source = self.source.name(),
            timeout = ?self.options.timeout,
            high_accuracy = self.options.high_accuracy,
            "Requesting position fix"
        );

        let fix = tokio::time::timeout(
            self.options.timeout,
            self.source.current_position(&self.options),
        )
        .await
        .map_err(|_| LocationError::Timeout(self.options.timeout))??;

        if !fix.is_valid() {
            return Err(LocationError::PositionUnavailable(format!(
                "source {} returned out-of-range coordinates ({}, {})",
                self.source.name(),
                fix.latitude,
                fix.longitude
            )));
        }

        debug!(
            latitude = fix.latitude,
            longitude = fix.longitude,
            "Position fix acquired"
        );
        Ok(fix)
    }

    async fn resolve_address(&self, fix: Fix) -> String {
        match self.geocoder.display_name(fix).await {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => {
                warn!("Reverse geocoding returned no address, using fallback");
                self.fallback_address.clone()
            }
            Err(e) => {
                warn!(error = %e, "Reverse geocoding failed, using fallback");
                self.fallback_address.clone()
            }
        }
    }
}
