//! Catalog of planned focus sessions.
//!
//! The free functions are pure and operate on a borrowed catalog; the
//! [`ScheduleManager`] wraps them with load/save so every purge or status
//! change is on disk before it returns.
//!
//! "Today" always means the calendar day of the supplied `now`, in `now`'s
//! own time zone.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, ValidationError};
use crate::session::{ScheduledSession, SessionStatus};
use crate::storage::{KvBackend, SessionStore};

fn same_day<Tz: TimeZone>(instant: &DateTime<Utc>, now: &DateTime<Tz>) -> bool {
    instant.with_timezone(&now.timezone()).date_naive() == now.date_naive()
}

/// Remove sessions scheduled earlier today that were never started.
///
/// Entries on other days and entries that already finished are kept, as is
/// `except`: the session a live run is linked to stays `scheduled` until
/// that run ends. Returns how many entries were removed.
pub fn purge_missed<Tz: TimeZone>(
    sessions: &mut Vec<ScheduledSession>,
    now: &DateTime<Tz>,
    except: Option<Uuid>,
) -> usize {
    let before = sessions.len();
    sessions.retain(|s| {
        Some(s.id) == except
            || !(s.status == SessionStatus::Scheduled
                && same_day(&s.scheduled_date, now)
                && s.scheduled_date < *now)
    });
    before - sessions.len()
}

/// The earliest still-scheduled session later today (or right now).
pub fn next_session_for_today<'a, Tz: TimeZone>(
    sessions: &'a [ScheduledSession],
    now: &DateTime<Tz>,
) -> Option<&'a ScheduledSession> {
    let mut candidates: Vec<&ScheduledSession> = sessions
        .iter()
        .filter(|s| {
            s.status == SessionStatus::Scheduled
                && same_day(&s.scheduled_date, now)
                && s.scheduled_date >= *now
        })
        .collect();
    candidates.sort_by_key(|s| s.scheduled_date);
    candidates.into_iter().next()
}

/// Set the status of the session with `id`.
///
/// Unknown ids and already-finished sessions are left alone. Returns the
/// updated entry when a change was made.
pub fn mark_outcome(
    sessions: &mut [ScheduledSession],
    id: Uuid,
    status: SessionStatus,
) -> Option<&ScheduledSession> {
    let session = sessions.iter_mut().find(|s| s.id == id)?;
    if session.status.is_terminal() || !status.is_terminal() {
        return None;
    }
    session.status = status;
    Some(session)
}

/// Whether a run may be started for `session` at `now`.
///
/// Only a still-scheduled session dated today whose start time has not
/// passed qualifies.
pub fn can_start<Tz: TimeZone>(session: &ScheduledSession, now: &DateTime<Tz>) -> bool {
    session.status == SessionStatus::Scheduled
        && same_day(&session.scheduled_date, now)
        && *now <= session.scheduled_date
}

/// Build sessions at `start_time` on each of `dates`, in `tz`.
///
/// Dates whose local time does not exist (a DST gap) are skipped.
///
/// # Errors
/// Rejects a zero duration or an empty date set.
pub fn build_sessions<Tz: TimeZone>(
    dates: &[NaiveDate],
    start_time: NaiveTime,
    duration_minutes: u32,
    tz: &Tz,
) -> Result<Vec<ScheduledSession>, ValidationError> {
    if duration_minutes == 0 {
        return Err(ValidationError::ZeroDuration);
    }
    if dates.is_empty() {
        return Err(ValidationError::NoDates);
    }
    Ok(dates
        .iter()
        .filter_map(|date| {
            tz.from_local_datetime(&date.and_time(start_time))
                .earliest()
                .map(|local| ScheduledSession::new(local.with_timezone(&Utc), duration_minutes))
        })
        .collect())
}

/// Persistent view of the catalog.
pub struct ScheduleManager<'a, B> {
    store: &'a SessionStore<B>,
}

impl<'a, B: KvBackend> ScheduleManager<'a, B> {
    pub fn new(store: &'a SessionStore<B>) -> Self {
        Self { store }
    }

    pub fn sessions(&self) -> Vec<ScheduledSession> {
        self.store.load_sessions()
    }

    pub fn find(&self, id: Uuid) -> Option<ScheduledSession> {
        self.sessions().into_iter().find(|s| s.id == id)
    }

    /// The session linked to the run recorded as still live, if any.
    fn live_link(&self) -> Option<Uuid> {
        self.store
            .load_snapshot()
            .filter(|s| s.is_active)
            .and_then(|s| s.scheduled_session_id)
    }

    /// Purge missed sessions and persist the result. The session linked to
    /// a live (or killed, not yet recovered) run is kept.
    ///
    /// # Errors
    /// Returns an error if the purged catalog cannot be written.
    pub fn purge_missed<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<usize, StoreError> {
        let mut sessions = self.sessions();
        let purged = purge_missed(&mut sessions, now, self.live_link());
        if purged > 0 {
            self.store.save_sessions(&sessions)?;
            info!(purged, "removed missed sessions");
        }
        Ok(purged)
    }

    pub fn next_session_for_today<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<ScheduledSession> {
        let sessions = self.sessions();
        next_session_for_today(&sessions, now).cloned()
    }

    /// Record a terminal status for `id` and persist it.
    ///
    /// # Errors
    /// Returns an error if the updated catalog cannot be written.
    pub fn mark_outcome(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> Result<Option<ScheduledSession>, StoreError> {
        let mut sessions = self.sessions();
        let updated = mark_outcome(&mut sessions, id, status).cloned();
        match updated {
            Some(session) => {
                self.store.save_sessions(&sessions)?;
                debug!(%id, ?status, "session status recorded");
                Ok(Some(session))
            }
            None => {
                debug!(%id, ?status, "no scheduled session updated");
                Ok(None)
            }
        }
    }

    /// Add sessions at `start_time` on each of `dates`, sort the catalog,
    /// drop missed entries and persist. Returns the sessions that were
    /// created and survived the purge.
    ///
    /// # Errors
    /// Returns a validation error for bad input, or a store error if the
    /// catalog cannot be written.
    pub fn plan<Tz: TimeZone>(
        &self,
        dates: &[NaiveDate],
        start_time: NaiveTime,
        duration_minutes: u32,
        now: &DateTime<Tz>,
    ) -> crate::error::Result<Vec<ScheduledSession>> {
        let created = build_sessions(dates, start_time, duration_minutes, &now.timezone())?;
        let mut sessions = self.sessions();
        sessions.extend(created.iter().cloned());
        sessions.sort_by_key(|s| s.scheduled_date);
        purge_missed(&mut sessions, now, self.live_link());
        self.store.save_sessions(&sessions)?;

        let kept: Vec<ScheduledSession> = created
            .into_iter()
            .filter(|c| sessions.iter().any(|s| s.id == c.id))
            .collect();
        info!(planned = kept.len(), duration_minutes, "sessions planned");
        Ok(kept)
    }
}
