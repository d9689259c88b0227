//! Session data model.
//!
//! Two records describe all durable session state: the catalog of
//! [`ScheduledSession`]s and the singleton [`CurrentSessionSnapshot`] of the
//! run in progress. A third, coarser [`FallbackMarker`] backs up the snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a planned session.
///
/// Moves forward only: `Scheduled` may become `Completed` or `Failed`, and a
/// terminal status never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Scheduled)
    }
}

/// Final result of one timer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Succeeded,
    Failed,
}

impl SessionOutcome {
    /// Catalog status a linked session takes on for this outcome.
    pub fn status(self) -> SessionStatus {
        match self {
            SessionOutcome::Succeeded => SessionStatus::Completed,
            SessionOutcome::Failed => SessionStatus::Failed,
        }
    }
}

/// A session the user planned ahead of time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSession {
    pub id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: SessionStatus,
}

impl ScheduledSession {
    pub fn new(scheduled_date: DateTime<Utc>, duration_minutes: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            scheduled_date,
            duration_minutes,
            status: SessionStatus::Scheduled,
        }
    }
}

/// Durable record of the run in progress (or the last one, until its outcome
/// is acknowledged).
///
/// Holds the absolute end instant rather than a duration so that a relaunched
/// process can reason about the run by reading the clock again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSessionSnapshot {
    pub is_active: bool,
    pub end_date: DateTime<Utc>,
    pub did_succeed: bool,
    pub did_fail: bool,
    #[serde(rename = "scheduledSessionID", default)]
    pub scheduled_session_id: Option<Uuid>,
    #[serde(default)]
    pub run_id: Uuid,
}

impl CurrentSessionSnapshot {
    /// Snapshot for a run that has just started.
    pub fn begin(run_id: Uuid, end_date: DateTime<Utc>, scheduled_session_id: Option<Uuid>) -> Self {
        Self {
            is_active: true,
            end_date,
            did_succeed: false,
            did_fail: false,
            scheduled_session_id,
            run_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.did_succeed || self.did_fail
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        if self.did_succeed {
            Some(SessionOutcome::Succeeded)
        } else if self.did_fail {
            Some(SessionOutcome::Failed)
        } else {
            None
        }
    }

    /// Move an active snapshot to its terminal state.
    ///
    /// Returns `false` and leaves the snapshot untouched when it is no longer
    /// active, so a second completion or failure cannot overwrite the first.
    pub fn conclude(&mut self, outcome: SessionOutcome) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.did_succeed = outcome == SessionOutcome::Succeeded;
        self.did_fail = outcome == SessionOutcome::Failed;
        true
    }
}

/// Coarse "a timer was running until `end_date`" record.
///
/// Written alongside the snapshot on start and cleared on every terminal
/// outcome; recovery falls back to it when the snapshot is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackMarker {
    pub was_focusing: bool,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl FallbackMarker {
    pub fn running_until(end_date: DateTime<Utc>) -> Self {
        Self {
            was_focusing: true,
            end_date: Some(end_date),
        }
    }

    /// True when the marker says a timer was running and its end is still
    /// ahead of `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.was_focusing && self.end_date.is_some_and(|end| end > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn snapshot_concludes_once() {
        let mut snap = CurrentSessionSnapshot::begin(Uuid::new_v4(), end(), None);
        assert!(snap.conclude(SessionOutcome::Failed));
        assert!(!snap.conclude(SessionOutcome::Succeeded));
        assert!(snap.did_fail);
        assert!(!snap.did_succeed);
        assert_eq!(snap.outcome(), Some(SessionOutcome::Failed));
    }

    #[test]
    fn snapshot_uses_stored_json_keys() {
        let id = Uuid::new_v4();
        let snap = CurrentSessionSnapshot::begin(Uuid::new_v4(), end(), Some(id));
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["isActive"], true);
        assert_eq!(json["scheduledSessionID"], id.to_string());
        assert_eq!(json["endDate"], "2026-06-15T10:30:00Z");
    }

    #[test]
    fn snapshot_without_run_id_still_decodes() {
        let json = r#"{"isActive":true,"endDate":"2026-06-15T10:30:00Z","didSucceed":false,"didFail":false}"#;
        let snap: CurrentSessionSnapshot = serde_json::from_str(json).unwrap();
        assert!(snap.is_active);
        assert!(snap.scheduled_session_id.is_none());
        assert!(snap.run_id.is_nil());
    }

    #[test]
    fn marker_liveness() {
        let marker = FallbackMarker::running_until(end());
        assert!(marker.is_live_at(end() - chrono::Duration::seconds(1)));
        assert!(!marker.is_live_at(end()));
        assert!(!FallbackMarker::default().is_live_at(end()));
    }
}
