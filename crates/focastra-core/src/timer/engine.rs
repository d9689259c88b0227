//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads and it never counts ticks: every query recomputes the
//! remaining time as `end_date - now`, so a process that was suspended for
//! any length of time is correct on its first `resync`.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Completed(succeeded | failed)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new();
//! engine.start(30, now);
//! // Once a second, and whenever the app returns to the foreground:
//! if let Some(outcome) = engine.resync(now) { /* finished */ }
//! ```
//!
//! The engine does not write anything to storage. It exposes the
//! [`FallbackMarker`] that describes it, and the owner persists that.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::Event;
use crate::session::{FallbackMarker, SessionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Completed,
}

/// Core timer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    state: TimerState,
    run_id: Option<Uuid>,
    /// Absolute instant the running countdown reaches zero.
    end_date: Option<DateTime<Utc>>,
    /// Last computed remaining time, for display.
    remaining_secs: u64,
    /// Only meaningful in `Completed`.
    succeeded: bool,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerEngine {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
            run_id: None,
            end_date: None,
            remaining_secs: 0,
            succeeded: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_focusing(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn session_complete(&self) -> bool {
        self.state == TimerState::Completed
    }

    /// True once a run completed with the full duration served.
    pub fn succeeded(&self) -> bool {
        self.state == TimerState::Completed && self.succeeded
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Identifier of the current (or last) run.
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    /// Run id, only while the countdown is live.
    pub fn running_run_id(&self) -> Option<Uuid> {
        if self.is_focusing() {
            self.run_id
        } else {
            None
        }
    }

    /// The coarse marker describing this engine for launch recovery.
    pub fn fallback_marker(&self) -> FallbackMarker {
        match (self.state, self.end_date) {
            (TimerState::Running, Some(end)) => FallbackMarker::running_until(end),
            _ => FallbackMarker::default(),
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, at: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            is_focusing: self.is_focusing(),
            remaining_secs: self.remaining_secs,
            session_complete: self.session_complete(),
            succeeded: self.succeeded(),
            end_date: self.end_date,
            at,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a countdown of `duration_minutes` from `now`.
    ///
    /// Returns the new run id, or `None` when a run is already live or the
    /// duration is zero.
    pub fn start(&mut self, duration_minutes: u32, now: DateTime<Utc>) -> Option<Uuid> {
        if self.state == TimerState::Running || duration_minutes == 0 {
            return None;
        }
        let run_id = Uuid::new_v4();
        let end = now + Duration::minutes(i64::from(duration_minutes));
        self.state = TimerState::Running;
        self.run_id = Some(run_id);
        self.end_date = Some(end);
        self.succeeded = false;
        self.remaining_secs = remaining_between(end, now);
        Some(run_id)
    }

    /// Reattach to a previously persisted end instant.
    ///
    /// Completes as a success right away if the end is already behind
    /// `now`. Ignored while a run is live.
    pub fn restore(
        &mut self,
        run_id: Uuid,
        end_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<SessionOutcome> {
        if self.state == TimerState::Running {
            return None;
        }
        self.state = TimerState::Running;
        self.run_id = Some(run_id);
        self.end_date = Some(end_date);
        self.succeeded = false;
        self.resync(now)
    }

    /// Recompute the remaining time against the wall clock.
    ///
    /// Returns `Some(Succeeded)` on the call that finishes the run.
    pub fn resync(&mut self, now: DateTime<Utc>) -> Option<SessionOutcome> {
        if self.state != TimerState::Running {
            return None;
        }
        let end = self.end_date?;
        self.remaining_secs = remaining_between(end, now);
        if self.remaining_secs == 0 {
            self.finish(true);
            return Some(SessionOutcome::Succeeded);
        }
        None
    }

    /// Call periodically (about once a second) to refresh the display value.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<SessionOutcome> {
        self.resync(now)
    }

    /// Stop the live run as a failure, whatever time is left.
    ///
    /// Returns `Some(Failed)` only for the call that actually stopped it.
    pub fn end_early(&mut self) -> Option<SessionOutcome> {
        if self.state != TimerState::Running {
            return None;
        }
        self.finish(false);
        Some(SessionOutcome::Failed)
    }

    /// Show a finished run that was never live in this process, such as
    /// one resolved by launch recovery.
    pub fn present(&mut self, outcome: SessionOutcome) {
        self.finish(outcome == SessionOutcome::Succeeded);
    }

    /// Back to `Idle` once a finished run has been acknowledged.
    pub fn reset(&mut self) {
        if self.state == TimerState::Completed {
            *self = Self::new();
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn finish(&mut self, succeeded: bool) {
        self.state = TimerState::Completed;
        self.succeeded = succeeded;
        self.remaining_secs = 0;
        self.end_date = None;
    }
}

/// Whole seconds from `now` until `end`, rounded down, never negative.
fn remaining_between(end: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((end - now).num_seconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn start_sets_end_from_wall_clock() {
        let mut engine = TimerEngine::new();
        assert_eq!(engine.state(), TimerState::Idle);
        assert!(engine.start(30, t0()).is_some());
        assert!(engine.is_focusing());
        assert_eq!(engine.end_date(), Some(t0() + Duration::minutes(30)));
        assert_eq!(engine.remaining_secs(), 1800);
    }

    #[test]
    fn double_start_is_ignored() {
        let mut engine = TimerEngine::new();
        let first = engine.start(30, t0()).unwrap();
        assert!(engine.start(5, t0() + Duration::seconds(3)).is_none());
        assert_eq!(engine.run_id(), Some(first));
        assert_eq!(engine.end_date(), Some(t0() + Duration::minutes(30)));
    }

    #[test]
    fn zero_duration_is_ignored() {
        let mut engine = TimerEngine::new();
        assert!(engine.start(0, t0()).is_none());
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[test]
    fn resync_after_suspend_completes_with_success() {
        let mut engine = TimerEngine::new();
        engine.start(30, t0());
        assert!(engine.resync(t0() + Duration::minutes(10)).is_none());
        assert_eq!(engine.remaining_secs(), 20 * 60);

        let outcome = engine.resync(t0() + Duration::minutes(30) + Duration::seconds(1));
        assert_eq!(outcome, Some(SessionOutcome::Succeeded));
        assert!(engine.succeeded());
        assert!(engine.session_complete());
        assert!(engine.resync(t0() + Duration::minutes(31)).is_none());
    }

    #[test]
    fn sub_second_remainder_counts_as_finished() {
        let mut engine = TimerEngine::new();
        engine.start(1, t0());
        let almost = t0() + Duration::seconds(59) + Duration::milliseconds(500);
        assert_eq!(engine.tick(almost), Some(SessionOutcome::Succeeded));
    }

    #[test]
    fn end_early_fails_once() {
        let mut engine = TimerEngine::new();
        engine.start(30, t0());
        assert_eq!(engine.end_early(), Some(SessionOutcome::Failed));
        assert!(engine.end_early().is_none());
        assert!(engine.session_complete());
        assert!(!engine.succeeded());
        assert_eq!(engine.remaining_secs(), 0);
    }

    #[test]
    fn restore_resumes_or_completes() {
        let run = Uuid::new_v4();
        let mut engine = TimerEngine::new();
        assert!(engine
            .restore(run, t0() + Duration::minutes(5), t0())
            .is_none());
        assert!(engine.is_focusing());
        assert_eq!(engine.remaining_secs(), 300);

        let mut late = TimerEngine::new();
        assert_eq!(
            late.restore(run, t0(), t0() + Duration::seconds(1)),
            Some(SessionOutcome::Succeeded)
        );
    }

    #[test]
    fn marker_follows_running_state() {
        let mut engine = TimerEngine::new();
        assert!(!engine.fallback_marker().was_focusing);
        engine.start(30, t0());
        assert_eq!(
            engine.fallback_marker(),
            FallbackMarker::running_until(t0() + Duration::minutes(30))
        );
        engine.end_early();
        assert!(!engine.fallback_marker().was_focusing);
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let mut engine = TimerEngine::new();
        engine.start(25, t0());
        match engine.snapshot(t0()) {
            Event::StateSnapshot {
                is_focusing,
                remaining_secs,
                session_complete,
                ..
            } => {
                assert!(is_focusing);
                assert!(!session_complete);
                assert_eq!(remaining_secs, 25 * 60);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }

    proptest! {
        #[test]
        fn completion_depends_only_on_wall_clock(
            minutes in 1u32..240,
            gaps in proptest::collection::vec(0i64..4000, 0..20),
            overshoot in 0i64..100_000,
        ) {
            let mut engine = TimerEngine::new();
            engine.start(minutes, t0());
            let end = t0() + Duration::minutes(i64::from(minutes));

            // Any pattern of missed or irregular ticks before the end.
            let mut now = t0();
            for gap in gaps {
                now += Duration::seconds(gap);
                if now >= end {
                    break;
                }
                prop_assert!(engine.tick(now).is_none());
                prop_assert_eq!(engine.remaining_secs(), (end - now).num_seconds() as u64);
            }

            let outcome = engine.resync(end + Duration::seconds(overshoot));
            prop_assert_eq!(outcome, Some(SessionOutcome::Succeeded));
        }
    }
}
