//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::Value;

use crate::clock::FixedClock;
use crate::error::{Error, Result};
use crate::location::{
    Fix, GeocodeError, LocationError, PositionOptions, PositionSource, ReverseGeocoder,
};
use crate::store::{KeyValueStore, MemoryStore};

/// Coordinates of Tokyo Station.
pub fn tokyo_station() -> Fix {
    Fix {
        latitude: 35.6812,
        longitude: 139.7671,
    }
}

/// Parse an RFC 3339 timestamp.
pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

/// Always answers with the same outcome.
#[derive(Debug)]
pub struct StaticPosition {
    outcome: std::result::Result<Fix, LocationError>,
}

impl StaticPosition {
    pub fn ok(fix: Fix) -> Self {
        Self { outcome: Ok(fix) }
    }

    pub fn err(error: LocationError) -> Self {
        Self {
            outcome: Err(error),
        }
    }
}

#[async_trait::async_trait]
impl PositionSource for StaticPosition {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> std::result::Result<Fix, LocationError> {
        self.outcome.clone()
    }
}

/// Answers with queued outcomes in order, then reports unavailable.
#[derive(Debug)]
pub struct ScriptedPosition {
    outcomes: Mutex<VecDeque<std::result::Result<Fix, LocationError>>>,
    calls: AtomicUsize,
}

impl ScriptedPosition {
    pub fn new(outcomes: Vec<std::result::Result<Fix, LocationError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PositionSource for ScriptedPosition {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> std::result::Result<Fix, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(LocationError::PositionUnavailable(
                    "script exhausted".to_string(),
                ))
            })
    }
}

/// Moves a fixed clock forward while "waiting" for the fix.
#[derive(Debug)]
pub struct SlowPosition {
    pub fix: Fix,
    pub clock: Arc<FixedClock>,
    pub takes: chrono::Duration,
}

#[async_trait::async_trait]
impl PositionSource for SlowPosition {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> std::result::Result<Fix, LocationError> {
        self.clock.advance(self.takes);
        Ok(self.fix)
    }
}

/// Never produces a fix.
#[derive(Debug)]
pub struct HangingPosition;

#[async_trait::async_trait]
impl PositionSource for HangingPosition {
    fn name(&self) -> &'static str {
        "hanging"
    }

    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> std::result::Result<Fix, LocationError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(LocationError::Unknown("woke up".to_string()))
    }
}

/// Answers every lookup with the same name.
#[derive(Debug)]
pub struct StaticGeocoder(Option<String>);

impl StaticGeocoder {
    pub fn named(name: &str) -> Self {
        Self(Some(name.to_string()))
    }
}

#[async_trait::async_trait]
impl ReverseGeocoder for StaticGeocoder {
    async fn display_name(&self, _fix: Fix) -> std::result::Result<Option<String>, GeocodeError> {
        Ok(self.0.clone())
    }
}

/// Fails every lookup as if the service were down.
#[derive(Debug)]
pub struct FailingGeocoder;

#[async_trait::async_trait]
impl ReverseGeocoder for FailingGeocoder {
    async fn display_name(&self, _fix: Fix) -> std::result::Result<Option<String>, GeocodeError> {
        Err(GeocodeError::Status(StatusCode::SERVICE_UNAVAILABLE))
    }
}

/// A store that fails writes, and optionally reads too.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: bool,
}

impl FailingStore {
    pub fn writes_only() -> Self {
        Self::default()
    }

    pub fn reads_and_writes() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_reads: true,
        }
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        if self.fail_reads {
            return Err(Error::storage("disk unavailable"));
        }
        self.inner.get(key)
    }

    fn set(&self, _key: &str, _value: &Value) -> Result<()> {
        Err(Error::storage("disk unavailable"))
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::storage("disk unavailable"))
    }
}
