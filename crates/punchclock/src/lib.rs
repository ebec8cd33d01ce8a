//! `punchclock` - A location-stamped attendance clock
//!
//! This library records clock-in and clock-out events for logged-in users,
//! stamping each with a fresh device position and a best-effort street
//! address, and keeps them in a durable append-only ledger.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod location;
pub mod logging;
pub mod record;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use auth::{Accounts, User};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use ledger::Ledger;
pub use location::{Location, LocationError, LocationResolver};
pub use logging::init_logging;
pub use record::{AttendanceRecord, ClockType};
pub use session::{AttendanceSession, SessionStatus};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreStats};
