//! Durable key-value storage.
//!
//! Everything punchclock persists is a JSON value under one of a few string
//! keys (see [`keys`]). Writes are atomic per key; nothing spans keys.

mod memory;
mod schema;
mod sqlite;

use serde_json::Value;

use crate::error::Result;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, StoreStats};

/// Keys used in the store.
pub mod keys {
    /// The logged-in user, absent when logged out.
    pub const CURRENT_USER: &str = "currentUser";
    /// All registered users.
    pub const USERS: &str = "users";
    /// Every attendance record of every user, in insertion order.
    pub const ATTENDANCE_RECORDS: &str = "attendanceRecords";
}

/// A durable mapping from string keys to JSON values.
///
/// Implementations report every failure as
/// [`Error::StorageUnavailable`](crate::Error::StorageUnavailable).
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or holds malformed data.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// Delete `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn remove(&self, key: &str) -> Result<()>;
}
