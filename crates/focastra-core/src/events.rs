use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionOutcome;

/// Why a run ended without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The user moved to another app for longer than the grace window.
    LeftApp,
    /// The user stopped the run.
    EndedEarly,
}

/// Why a scheduled background failure was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The app came back before the grace window ran out.
    Foreground,
    /// A lock signal explained the background transition.
    DeviceLocked,
    /// The run it was scheduled for is no longer live.
    Stale,
}

/// Where launch recovery found the interrupted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoverySource {
    Snapshot,
    Marker,
}

/// Every observable state change of the session service produces an Event.
/// Hosts render them; `SessionTerminal` fires exactly once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        run_id: Uuid,
        scheduled_session_id: Option<Uuid>,
        duration_minutes: u32,
        end_date: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The app went to the background with no lock signal; the run fails
    /// at `deadline` unless something cancels it first.
    FailureScheduled {
        run_id: Uuid,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    FailureCancelled {
        run_id: Uuid,
        reason: CancelReason,
        at: DateTime<Utc>,
    },
    SessionTerminal {
        run_id: Uuid,
        outcome: SessionOutcome,
        reason: Option<FailureReason>,
        scheduled_session_id: Option<Uuid>,
        at: DateTime<Utc>,
    },
    /// Launch recovery resolved a run left behind by a dead process.
    SessionRecovered {
        source: RecoverySource,
        scheduled_session_id: Option<Uuid>,
        duration_minutes: u32,
        at: DateTime<Utc>,
    },
    MissedSessionsPurged {
        count: usize,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        is_focusing: bool,
        remaining_secs: u64,
        session_complete: bool,
        succeeded: bool,
        end_date: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
}
