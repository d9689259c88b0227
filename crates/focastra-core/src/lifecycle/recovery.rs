//! Launch recovery for runs left behind by a dead process.
//!
//! A process that is force-closed or crashes gets no lifecycle callback, so
//! whatever run it had live is still marked active on disk. There is no way
//! to tell a crash from the user swiping the app away, so such a run always
//! resolves to a failure.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::events::{Event, RecoverySource};
use crate::schedule::ScheduleManager;
use crate::session::{
    CurrentSessionSnapshot, FallbackMarker, ScheduledSession, SessionOutcome, SessionStatus,
};
use crate::storage::{KvBackend, SessionStore};

/// A run that recovery resolved to failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveredFailure {
    pub source: RecoverySource,
    pub snapshot: CurrentSessionSnapshot,
    /// The linked catalog entry, after it was marked failed.
    pub scheduled_session: Option<ScheduledSession>,
    /// Planned length to show with the failure.
    pub duration_minutes: u32,
}

/// What one launch recovery pass found and changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryReport {
    pub purged: usize,
    pub failure: Option<RecoveredFailure>,
    /// A terminal snapshot from an earlier process that was never
    /// acknowledged. Left as it was.
    pub unacknowledged: Option<CurrentSessionSnapshot>,
    #[serde(skip)]
    pub events: Vec<Event>,
}

impl RecoveryReport {
    /// The snapshot the session service should carry forward.
    pub fn snapshot(&self) -> Option<&CurrentSessionSnapshot> {
        self.failure
            .as_ref()
            .map(|f| &f.snapshot)
            .or(self.unacknowledged.as_ref())
    }
}

pub struct RecoveryProcedure<'a, B> {
    store: &'a SessionStore<B>,
    default_duration_minutes: u32,
}

impl<'a, B: KvBackend> RecoveryProcedure<'a, B> {
    /// `default_duration_minutes` is reported for failures with no linked
    /// session to take a duration from.
    pub fn new(store: &'a SessionStore<B>, default_duration_minutes: u32) -> Self {
        Self {
            store,
            default_duration_minutes,
        }
    }

    /// Run all recovery steps once.
    ///
    /// Storage write failures are logged; the report still describes the
    /// decision so the host can show it.
    pub fn run<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> RecoveryReport {
        let at = now.with_timezone(&Utc);
        let mut report = RecoveryReport::default();
        let schedule = ScheduleManager::new(self.store);

        // The purge keeps whatever session the still-active snapshot links
        // to, so the failure below can be recorded against it.
        match schedule.purge_missed(now) {
            Ok(purged) => report.purged = purged,
            Err(e) => error!(error = %e, "could not persist purged catalog"),
        }
        if report.purged > 0 {
            report.events.push(Event::MissedSessionsPurged {
                count: report.purged,
                at,
            });
        }

        match self.store.load_snapshot() {
            Some(snapshot) if snapshot.is_active => {
                report.failure = Some(self.fail_snapshot(snapshot, &schedule));
            }
            Some(snapshot) => {
                report.unacknowledged = Some(snapshot);
            }
            None => {
                report.failure = self.fail_from_marker(at);
            }
        }
        self.clear_marker();

        if let Some(failure) = &report.failure {
            info!(
                source = ?failure.source,
                scheduled_session_id = ?failure.snapshot.scheduled_session_id,
                "interrupted run recovered as failed"
            );
            report.events.push(Event::SessionRecovered {
                source: failure.source,
                scheduled_session_id: failure.snapshot.scheduled_session_id,
                duration_minutes: failure.duration_minutes,
                at,
            });
        }
        report
    }

    fn fail_snapshot(
        &self,
        mut snapshot: CurrentSessionSnapshot,
        schedule: &ScheduleManager<'_, B>,
    ) -> RecoveredFailure {
        snapshot.conclude(SessionOutcome::Failed);
        if let Err(e) = self.store.save_snapshot(Some(&snapshot)) {
            error!(error = %e, "could not persist recovered snapshot");
        }

        let scheduled_session = snapshot.scheduled_session_id.and_then(|id| {
            match schedule.mark_outcome(id, SessionStatus::Failed) {
                Ok(Some(updated)) => Some(updated),
                // Already terminal or gone; report whatever is still stored.
                Ok(None) => schedule.find(id),
                Err(e) => {
                    error!(%id, error = %e, "could not persist recovered session status");
                    None
                }
            }
        });
        let duration_minutes = scheduled_session
            .as_ref()
            .map_or(self.default_duration_minutes, |s| s.duration_minutes);

        RecoveredFailure {
            source: RecoverySource::Snapshot,
            snapshot,
            scheduled_session,
            duration_minutes,
        }
    }

    fn fail_from_marker(&self, now: DateTime<Utc>) -> Option<RecoveredFailure> {
        let marker = self.store.load_marker();
        if !marker.is_live_at(now) {
            return None;
        }
        let end_date = marker.end_date?;

        let mut snapshot = CurrentSessionSnapshot::begin(uuid::Uuid::nil(), end_date, None);
        snapshot.conclude(SessionOutcome::Failed);
        if let Err(e) = self.store.save_snapshot(Some(&snapshot)) {
            error!(error = %e, "could not persist recovered snapshot");
        }

        Some(RecoveredFailure {
            source: RecoverySource::Marker,
            snapshot,
            scheduled_session: None,
            duration_minutes: self.default_duration_minutes,
        })
    }

    fn clear_marker(&self) {
        if let Err(e) = self.store.save_marker(&FallbackMarker::default()) {
            error!(error = %e, "could not clear timer marker");
        }
    }
}
