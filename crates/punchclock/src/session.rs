//! Attendance session: one user's clock actions and their derived state.
//!
//! A session runs one clock action at a time. Each action moves through
//! `Idle -> Loading -> (Success | Failed) -> Idle`; on failure the cached
//! records are untouched and the message is kept in `last_error`. Actions
//! take `&mut self`, so two actions on one session can never interleave.
//!
//! The cache always belongs to one user. An action for a user other than the
//! loaded one first reloads the cache for that user.
//!
//! State changes are published on a [`watch`] channel; shells either
//! [`subscribe`](AttendanceSession::subscribe) or poll the accessors.

use std::sync::Arc;

use chrono::{Local, TimeZone};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::location::LocationResolver;
use crate::record::{AttendanceRecord, ClockType};

/// Snapshot published to subscribers after every state change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    /// Whether a clock action is in flight.
    pub is_loading: bool,
    /// Message of the last failed action, cleared when a new one starts.
    pub last_error: Option<String>,
    /// Number of cached records.
    pub record_count: usize,
}

/// Orchestrates clock actions for the shell.
#[derive(Debug)]
pub struct AttendanceSession {
    ledger: Ledger,
    resolver: LocationResolver,
    clock: Arc<dyn Clock>,
    user_id: Option<String>,
    records: Vec<AttendanceRecord>,
    is_loading: bool,
    last_error: Option<String>,
    status: watch::Sender<SessionStatus>,
}

impl AttendanceSession {
    /// Create a session using the system clock.
    #[must_use]
    pub fn new(ledger: Ledger, resolver: LocationResolver) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            ledger,
            resolver,
            clock: Arc::new(SystemClock),
            user_id: None,
            records: Vec::new(),
            is_loading: false,
            last_error: None,
            status,
        }
    }

    /// Replace the clock used for timestamps and "today".
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the cached records with the ledger's records for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the ledger cannot be read; the cache
    /// is left as it was.
    pub fn load_records(&mut self, user_id: &str) -> Result<()> {
        self.records = self.ledger.list_by_user(user_id)?;
        self.user_id = Some(user_id.to_string());
        debug!(user_id, count = self.records.len(), "Loaded records");
        self.publish();
        Ok(())
    }

    /// Record a clock-in for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a location error if no position could be acquired, or a
    /// storage error if the user's records could not be read or the record
    /// could not be persisted. Nothing is recorded in either case.
    pub async fn clock_in(&mut self, user_id: &str) -> Result<AttendanceRecord> {
        self.clock_action(user_id, ClockType::ClockIn).await
    }

    /// Record a clock-out for `user_id`.
    ///
    /// # Errors
    ///
    /// Same as [`clock_in`](Self::clock_in).
    pub async fn clock_out(&mut self, user_id: &str) -> Result<AttendanceRecord> {
        self.clock_action(user_id, ClockType::ClockOut).await
    }

    async fn clock_action(&mut self, user_id: &str, kind: ClockType) -> Result<AttendanceRecord> {
        self.is_loading = true;
        self.last_error = None;
        self.publish();

        let result = match self.switch_user(user_id) {
            Ok(()) => self.record(user_id, kind).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(record) => self.records.push(record.clone()),
            Err(e) => {
                warn!(user_id, %kind, error = %e, "Clock action failed");
                self.last_error = Some(e.to_string());
            }
        }

        self.is_loading = false;
        self.publish();
        result
    }

    fn switch_user(&mut self, user_id: &str) -> Result<()> {
        if self.user_id.as_deref() == Some(user_id) {
            return Ok(());
        }
        if let Some(previous) = &self.user_id {
            debug!(previous = %previous, user_id, "Switching session user");
        }
        self.records = self.ledger.list_by_user(user_id)?;
        self.user_id = Some(user_id.to_string());
        Ok(())
    }

    async fn record(&self, user_id: &str, kind: ClockType) -> Result<AttendanceRecord> {
        let location = self.resolver.acquire().await?;
        let record = AttendanceRecord::new(user_id, kind, self.clock.now(), location);
        self.ledger.append(&record)?;

        info!(
            user_id,
            %kind,
            address = %record.location.address,
            "Clock action recorded"
        );
        Ok(record)
    }

    /// The user whose records are cached, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Cached records of the current user, in insertion order.
    #[must_use]
    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    /// Cached records dated today in the local time zone.
    ///
    /// "Today" is evaluated on every call.
    #[must_use]
    pub fn today_records(&self) -> Vec<&AttendanceRecord> {
        self.today_records_in(&Local)
    }

    /// Cached records dated today in `tz`.
    #[must_use]
    pub fn today_records_in<Tz: TimeZone>(&self, tz: &Tz) -> Vec<&AttendanceRecord> {
        let today = self.clock.now().with_timezone(tz).date_naive();
        self.records
            .iter()
            .filter(|record| record.date_in(tz) == today)
            .collect()
    }

    /// Whether a clock action is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Message of the last failed action.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The current state as a snapshot.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            is_loading: self.is_loading,
            last_error: self.last_error.clone(),
            record_count: self.records.len(),
        }
    }

    /// Receive a snapshot after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    fn publish(&self) {
        self.status.send_replace(self.status());
    }
}
