//! Durable session catalog and current-run snapshot.
//!
//! Reads never fail: an absent key is the first-run empty state, and a value
//! that no longer decodes is logged and treated the same way. The next
//! successful write replaces it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use super::kv::KvBackend;
use crate::error::StoreError;
use crate::session::{CurrentSessionSnapshot, FallbackMarker, ScheduledSession};

pub const SCHEDULED_SESSIONS_KEY: &str = "scheduledSessions";
pub const CURRENT_SESSION_KEY: &str = "currentSession";
pub const TIMER_MARKER_KEY: &str = "timerMarker";

/// JSON records over a [`KvBackend`].
pub struct SessionStore<B> {
    backend: B,
}

impl<B: KvBackend> SessionStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ── Catalog ──────────────────────────────────────────────────────

    pub fn load_sessions(&self) -> Vec<ScheduledSession> {
        self.read(SCHEDULED_SESSIONS_KEY).unwrap_or_default()
    }

    /// # Errors
    /// Returns an error if the backend rejects the write.
    pub fn save_sessions(&self, sessions: &[ScheduledSession]) -> Result<(), StoreError> {
        self.write(SCHEDULED_SESSIONS_KEY, &sessions)
    }

    // ── Snapshot ─────────────────────────────────────────────────────

    pub fn load_snapshot(&self) -> Option<CurrentSessionSnapshot> {
        self.read(CURRENT_SESSION_KEY)
    }

    /// Store the snapshot, or delete it when `None`.
    ///
    /// # Errors
    /// Returns an error if the backend rejects the write.
    pub fn save_snapshot(&self, snapshot: Option<&CurrentSessionSnapshot>) -> Result<(), StoreError> {
        match snapshot {
            Some(snapshot) => self.write(CURRENT_SESSION_KEY, snapshot),
            None => self.backend.remove(CURRENT_SESSION_KEY),
        }
    }

    // ── Fallback marker ──────────────────────────────────────────────

    pub fn load_marker(&self) -> FallbackMarker {
        self.read(TIMER_MARKER_KEY).unwrap_or_default()
    }

    /// # Errors
    /// Returns an error if the backend rejects the write.
    pub fn save_marker(&self, marker: &FallbackMarker) -> Result<(), StoreError> {
        if marker.was_focusing {
            self.write(TIMER_MARKER_KEY, marker)
        } else {
            self.backend.remove(TIMER_MARKER_KEY)
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!(key, error = %e, "kv read failed; treating record as absent");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "discarding undecodable record");
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.backend.set(key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;
    use crate::storage::{Database, MemoryKv};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn sample() -> ScheduledSession {
        ScheduledSession::new(Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap(), 30)
    }

    #[test]
    fn first_run_is_empty() {
        let store = SessionStore::new(MemoryKv::new());
        assert!(store.load_sessions().is_empty());
        assert!(store.load_snapshot().is_none());
        assert_eq!(store.load_marker(), FallbackMarker::default());
    }

    #[test]
    fn corrupt_records_read_as_empty() {
        let kv = MemoryKv::new();
        kv.set(SCHEDULED_SESSIONS_KEY, "[{not json").unwrap();
        kv.set(CURRENT_SESSION_KEY, "42").unwrap();
        let store = SessionStore::new(kv);
        assert!(store.load_sessions().is_empty());
        assert!(store.load_snapshot().is_none());

        // The next write heals the record.
        store.save_sessions(&[sample()]).unwrap();
        assert_eq!(store.load_sessions().len(), 1);
    }

    #[test]
    fn sessions_persist_in_order_with_iso_dates() {
        let store = SessionStore::new(MemoryKv::new());
        let mut later = sample();
        later.scheduled_date = later.scheduled_date + chrono::Duration::hours(2);
        later.status = SessionStatus::Failed;
        let sessions = vec![sample(), later];
        store.save_sessions(&sessions).unwrap();

        let raw = store.backend().raw(SCHEDULED_SESSIONS_KEY).unwrap();
        assert!(raw.contains("\"scheduledDate\":\"2026-06-15T09:00:00Z\""));
        assert!(raw.contains("\"status\":\"failed\""));

        let loaded = store.load_sessions();
        assert_eq!(loaded, sessions);
    }

    #[test]
    fn saving_none_deletes_snapshot() {
        let store = SessionStore::new(Database::open_memory().unwrap());
        let snap = CurrentSessionSnapshot::begin(
            Uuid::new_v4(),
            Utc.with_ymd_and_hms(2026, 6, 15, 9, 30, 0).unwrap(),
            None,
        );
        store.save_snapshot(Some(&snap)).unwrap();
        assert_eq!(store.load_snapshot(), Some(snap));
        store.save_snapshot(None).unwrap();
        assert!(store.load_snapshot().is_none());
    }

    #[test]
    fn cleared_marker_is_removed() {
        let store = SessionStore::new(MemoryKv::new());
        let end = Utc.with_ymd_and_hms(2026, 6, 15, 9, 30, 0).unwrap();
        store.save_marker(&FallbackMarker::running_until(end)).unwrap();
        assert!(store.backend().raw(TIMER_MARKER_KEY).is_some());
        store.save_marker(&FallbackMarker::default()).unwrap();
        assert!(store.backend().raw(TIMER_MARKER_KEY).is_none());
    }
}
