//! The attendance ledger.
//!
//! All records of all users live in one JSON array under
//! [`keys::ATTENDANCE_RECORDS`], in insertion order. Per-user views are
//! filtered in memory.
//!
//! `append` is a read-modify-write of that array. It is only correct with a
//! single writer: two processes appending at once can lose one of the
//! records. Supporting concurrent writers needs an atomic append in the
//! store (a log table, or compare-and-swap on a version).

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::record::AttendanceRecord;
use crate::store::{keys, KeyValueStore};

/// Append-only store of attendance records.
#[derive(Debug, Clone)]
pub struct Ledger {
    store: Arc<dyn KeyValueStore>,
}

impl Ledger {
    /// Create a ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Seed an empty collection if the store has none yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn init(&self) -> Result<()> {
        if self.store.get(keys::ATTENDANCE_RECORDS)?.is_none() {
            self.store
                .set(keys::ATTENDANCE_RECORDS, &serde_json::Value::Array(Vec::new()))?;
            debug!("Initialized empty attendance ledger");
        }
        Ok(())
    }

    /// Every record of every user, in insertion order.
    ///
    /// A missing collection reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store fails or the collection is
    /// malformed.
    pub fn list_all(&self) -> Result<Vec<AttendanceRecord>> {
        match self.store.get(keys::ATTENDANCE_RECORDS)? {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::storage(format!("malformed attendance records: {e}"))),
        }
    }

    /// Every record of `user_id`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store fails or the collection is
    /// malformed.
    pub fn list_by_user(&self, user_id: &str) -> Result<Vec<AttendanceRecord>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|record| record.user_id == user_id)
            .collect())
    }

    /// Number of records in the ledger.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store fails or the collection is
    /// malformed.
    pub fn count(&self) -> Result<usize> {
        Ok(self.list_all()?.len())
    }

    /// Persist `record` at the end of the ledger.
    ///
    /// A timestamp earlier than the user's previous record is logged and
    /// kept; clock skew never blocks a write.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRecord` if a record with the same id exists, and
    /// `StorageUnavailable` if the store fails. Nothing is written on error.
    pub fn append(&self, record: &AttendanceRecord) -> Result<()> {
        let mut records = self.list_all()?;

        if records.iter().any(|existing| existing.id == record.id) {
            return Err(Error::DuplicateRecord {
                id: record.id.clone(),
            });
        }

        if let Some(previous) = records
            .iter()
            .rev()
            .find(|existing| existing.user_id == record.user_id)
        {
            if record.timestamp < previous.timestamp {
                warn!(
                    user_id = %record.user_id,
                    previous = %previous.timestamp,
                    current = %record.timestamp,
                    "Record is older than the user's previous record (clock skew?)"
                );
            }
        }

        records.push(record.clone());
        let value = serde_json::to_value(&records)?;
        self.store.set(keys::ATTENDANCE_RECORDS, &value)?;

        info!(
            id = %record.id,
            user_id = %record.user_id,
            kind = %record.kind,
            "Appended attendance record"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::location::Location;
    use crate::record::ClockType;
    use crate::store::MemoryStore;
    use crate::testing::FailingStore;

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn record(user_id: &str, kind: ClockType, offset_minutes: i64) -> AttendanceRecord {
        AttendanceRecord::new(
            user_id,
            kind,
            base_time() + Duration::minutes(offset_minutes),
            Location {
                latitude: 35.6812,
                longitude: 139.7671,
                address: "Tokyo Station".to_string(),
            },
        )
    }

    fn create_test_ledger() -> (Arc<MemoryStore>, Ledger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(store.clone());
        (store, ledger)
    }

    #[test]
    fn test_empty_ledger() {
        let (_, ledger) = create_test_ledger();
        assert!(ledger.list_all().unwrap().is_empty());
        assert_eq!(ledger.count().unwrap(), 0);
    }

    #[test]
    fn test_init_seeds_empty_array() {
        let (store, ledger) = create_test_ledger();
        ledger.init().unwrap();
        assert_eq!(store.get(keys::ATTENDANCE_RECORDS).unwrap(), Some(json!([])));
    }

    #[test]
    fn test_init_keeps_existing_records() {
        let (_, ledger) = create_test_ledger();
        ledger.append(&record("u1", ClockType::ClockIn, 0)).unwrap();
        ledger.init().unwrap();
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn test_append_and_list() {
        let (_, ledger) = create_test_ledger();
        let first = record("u1", ClockType::ClockIn, 0);
        let second = record("u1", ClockType::ClockOut, 480);

        ledger.append(&first).unwrap();
        ledger.append(&second).unwrap();

        assert_eq!(ledger.list_all().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_list_by_user_filters_and_keeps_order() {
        let (_, ledger) = create_test_ledger();
        let appended = vec![
            record("u1", ClockType::ClockIn, 0),
            record("u2", ClockType::ClockIn, 5),
            record("u1", ClockType::ClockOut, 10),
            record("u2", ClockType::ClockOut, 15),
            record("u1", ClockType::ClockIn, 20),
        ];
        for r in &appended {
            ledger.append(r).unwrap();
        }

        let u1 = ledger.list_by_user("u1").unwrap();
        assert_eq!(u1.len(), 3);
        assert!(u1.iter().all(|r| r.user_id == "u1"));
        let expected: Vec<_> = appended.iter().filter(|r| r.user_id == "u1").cloned().collect();
        assert_eq!(u1, expected);

        assert!(ledger.list_by_user("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_list_by_user_does_not_mutate() {
        let (store, ledger) = create_test_ledger();
        ledger.append(&record("u1", ClockType::ClockIn, 0)).unwrap();
        let before = store.get(keys::ATTENDANCE_RECORDS).unwrap();

        ledger.list_by_user("u1").unwrap();
        ledger.list_by_user("u2").unwrap();

        assert_eq!(store.get(keys::ATTENDANCE_RECORDS).unwrap(), before);
    }

    #[test]
    fn test_append_rejects_duplicate_id() {
        let (_, ledger) = create_test_ledger();
        let r = record("u1", ClockType::ClockIn, 0);
        ledger.append(&r).unwrap();

        let err = ledger.append(&r).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRecord);
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn test_append_out_of_order_is_kept() {
        let (_, ledger) = create_test_ledger();
        let later = record("u1", ClockType::ClockIn, 60);
        let earlier = record("u1", ClockType::ClockOut, 0);

        ledger.append(&later).unwrap();
        ledger.append(&earlier).unwrap();

        assert_eq!(ledger.list_by_user("u1").unwrap(), vec![later, earlier]);
    }

    #[test]
    fn test_malformed_collection_is_storage_unavailable() {
        let (store, ledger) = create_test_ledger();
        store
            .set(keys::ATTENDANCE_RECORDS, &json!({"not": "an array"}))
            .unwrap();

        let err = ledger.list_all().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);

        let err = ledger
            .append(&record("u1", ClockType::ClockIn, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }

    #[test]
    fn test_store_failure_is_storage_unavailable() {
        let ledger = Ledger::new(Arc::new(FailingStore::reads_and_writes()));
        assert_eq!(
            ledger.list_by_user("u1").unwrap_err().kind(),
            ErrorKind::StorageUnavailable
        );
        assert_eq!(
            ledger
                .append(&record("u1", ClockType::ClockIn, 0))
                .unwrap_err()
                .kind(),
            ErrorKind::StorageUnavailable
        );
    }

    #[test]
    fn test_reads_web_client_records() {
        let (store, ledger) = create_test_ledger();
        store
            .set(
                keys::ATTENDANCE_RECORDS,
                &json!([{
                    "id": "rec_1704099600000",
                    "userId": "1",
                    "type": "clock-in",
                    "timestamp": "2024-01-01T09:00:00.000Z",
                    "location": {"latitude": 35.6812, "longitude": 139.7671, "address": "東京駅"}
                }]),
            )
            .unwrap();

        let records = ledger.list_by_user("1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ClockType::ClockIn);
    }
}
