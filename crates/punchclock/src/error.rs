//! Error types for punchclock.
//!
//! This module defines the crate-wide error type. Device-layer failures are
//! carried as [`LocationError`]; storage, account and configuration failures
//! have their own variants. Reverse-geocoding failures never appear here:
//! they are absorbed by the resolver and replaced with a fallback address.

use std::path::PathBuf;
use thiserror::Error;

use crate::location::LocationError;

/// The main error type for punchclock operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Location Errors ===
    /// The device position could not be acquired.
    #[error(transparent)]
    Location(#[from] LocationError),

    // === Storage Errors ===
    /// The durable store is unavailable or returned malformed data.
    #[error("storage unavailable: {message}")]
    StorageUnavailable {
        /// Description of what went wrong.
        message: String,
    },

    /// A record with the same id is already in the ledger.
    #[error("duplicate attendance record id: {id}")]
    DuplicateRecord {
        /// The colliding record id.
        id: String,
    },

    // === Account Errors ===
    /// Email/password did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// A user with this email is already registered.
    #[error("a user with email {email} already exists")]
    UserExists {
        /// The email that is already taken.
        email: String,
    },

    /// The action requires a logged-in user.
    #[error("not logged in")]
    NotLoggedIn,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for punchclock operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], for callers that branch on the
/// failure rather than display it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Location permission was refused.
    PermissionDenied,
    /// No position could be determined.
    PositionUnavailable,
    /// The position request did not complete in time.
    Timeout,
    /// Any other device-layer failure.
    Unknown,
    /// The durable store failed.
    StorageUnavailable,
    /// A record id collided with an existing one.
    DuplicateRecord,
    /// Login, registration or session failure.
    Account,
    /// Configuration could not be loaded or is invalid.
    Config,
    /// Anything else.
    Other,
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageUnavailable {
            message: err.to_string(),
        }
    }
}

impl Error {
    /// Create a new storage unavailable error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Location(err) => match err {
                LocationError::PermissionDenied(_) => ErrorKind::PermissionDenied,
                LocationError::PositionUnavailable(_) => ErrorKind::PositionUnavailable,
                LocationError::Timeout(_) => ErrorKind::Timeout,
                LocationError::Unknown(_) => ErrorKind::Unknown,
            },
            Self::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
            Self::DuplicateRecord { .. } => ErrorKind::DuplicateRecord,
            Self::InvalidCredentials | Self::UserExists { .. } | Self::NotLoggedIn => {
                ErrorKind::Account
            }
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } => ErrorKind::Config,
            Self::DirectoryCreate { .. } | Self::Json(_) | Self::Internal(_) => ErrorKind::Other,
        }
    }

    /// Check if this error came from the device position layer.
    #[must_use]
    pub fn is_location_error(&self) -> bool {
        matches!(self, Self::Location(_))
    }
}
