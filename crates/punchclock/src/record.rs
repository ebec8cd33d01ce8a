//! Core attendance record types.
//!
//! Records serialize as `{id, userId, type, timestamp, location}` with
//! `type` one of `"clock-in"`/`"clock-out"`, the same JSON the web client
//! keeps in local storage, so its ledgers can be imported as is.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::location::Location;

/// Whether a record marks the start or the end of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockType {
    /// Start of work.
    ClockIn,
    /// End of work.
    ClockOut,
}

impl std::fmt::Display for ClockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClockIn => write!(f, "clock-in"),
            Self::ClockOut => write!(f, "clock-out"),
        }
    }
}

/// One clock action by one user.
///
/// Created once per successful action and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// Unique identifier across the whole ledger.
    pub id: String,

    /// The user who clocked.
    pub user_id: String,

    /// Clock-in or clock-out.
    #[serde(rename = "type")]
    pub kind: ClockType,

    /// When the position was resolved.
    pub timestamp: DateTime<Utc>,

    /// Where the user clocked.
    pub location: Location,
}

impl AttendanceRecord {
    /// Create a record with a fresh random id.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        kind: ClockType,
        timestamp: DateTime<Utc>,
        location: Location,
    ) -> Self {
        Self {
            id: Self::generate_id(),
            user_id: user_id.into(),
            kind,
            timestamp,
            location,
        }
    }

    /// Generate a collision-resistant record id.
    #[must_use]
    pub fn generate_id() -> String {
        format!("rec_{}", uuid::Uuid::new_v4().simple())
    }

    /// The calendar date of this record in the given time zone.
    #[must_use]
    pub fn date_in<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.timestamp.with_timezone(tz).date_naive()
    }
}
