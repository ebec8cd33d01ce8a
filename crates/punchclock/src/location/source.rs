//! Position sources.
//!
//! [`CommandPositionSource`] bridges to a device locator program such as
//! `termux-location`; [`FixedPositionSource`] reports a configured static
//! position for machines without a receiver.

use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{Fix, LocationError, PositionOptions, PositionSource};
use crate::error::{Error, Result};

/// Runs an external locator and parses its JSON output.
///
/// The command must print a JSON object with numeric `latitude` and
/// `longitude` fields on stdout. On failure it exits with a W3C geolocation
/// error code (1 permission denied, 2 position unavailable, 3 timeout) and
/// may explain why on stderr. The request options are exported to the child
/// as `PUNCHCLOCK_HIGH_ACCURACY`, `PUNCHCLOCK_TIMEOUT_MS` and
/// `PUNCHCLOCK_MAXIMUM_AGE_MS`.
#[derive(Debug, Clone)]
pub struct CommandPositionSource {
    program: String,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LocatorOutput {
    latitude: f64,
    longitude: f64,
}

impl CommandPositionSource {
    /// Create a source running `program` with `args`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Create a source from a full argument vector.
    ///
    /// # Errors
    ///
    /// Returns an error if `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv.split_first().ok_or_else(|| Error::ConfigValidation {
            message: "location.command must name a program".to_string(),
        })?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }

    /// The program this source runs.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait::async_trait]
impl PositionSource for CommandPositionSource {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> std::result::Result<Fix, LocationError> {
        debug!(program = %self.program, "Running locator command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .env(
                "PUNCHCLOCK_HIGH_ACCURACY",
                if options.high_accuracy { "1" } else { "0" },
            )
            .env("PUNCHCLOCK_TIMEOUT_MS", options.timeout.as_millis().to_string())
            .env(
                "PUNCHCLOCK_MAXIMUM_AGE_MS",
                options.maximum_age.as_millis().to_string(),
            )
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    LocationError::PositionUnavailable(format!(
                        "locator command not found: {}",
                        self.program
                    ))
                } else {
                    LocationError::Unknown(format!("failed to run {}: {e}", self.program))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(match output.status.code() {
                Some(code) => LocationError::from_code(code, stderr, options.timeout),
                None => LocationError::Unknown(format!("{} was terminated", self.program)),
            });
        }

        let parsed: LocatorOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
            LocationError::Unknown(format!("unreadable output from {}: {e}", self.program))
        })?;

        Ok(Fix {
            latitude: parsed.latitude,
            longitude: parsed.longitude,
        })
    }
}

/// Reports a configured position, or `PositionUnavailable` if none is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPositionSource {
    fix: Option<Fix>,
}

impl FixedPositionSource {
    /// Create a source reporting `fix`.
    #[must_use]
    pub fn new(fix: Option<Fix>) -> Self {
        Self { fix }
    }
}

#[async_trait::async_trait]
impl PositionSource for FixedPositionSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> std::result::Result<Fix, LocationError> {
        self.fix.ok_or_else(|| {
            LocationError::PositionUnavailable(
                "no fixed position configured (set location.latitude and location.longitude)"
                    .to_string(),
            )
        })
    }
}
