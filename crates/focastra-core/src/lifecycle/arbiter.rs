//! Background/lock policy for a running session.
//!
//! The arbiter is the pure decision layer: it sees one ordered stream of
//! [`LifecycleEvent`]s plus the id of the live run, and answers with
//! [`Directive`]s. It never touches the timer or storage.
//!
//! ## Policy
//!
//! - `Inactive` never fails a run (system overlays, control centre).
//! - `Background` while the device is known to be locked is allowed.
//! - `Background` otherwise schedules a failure `grace_window` later. The
//!   lock notification often lands just after the background transition,
//!   so a `LockChanged(true)` inside the window cancels it.
//! - `LockChanged(false)` while still in the background re-arms the
//!   failure, since the user unlocked into some other app. A `Foreground`
//!   inside the window cancels it as usual.
//! - When the deadline is reached the lock flag is checked once more, and
//!   the failure is only committed for the same run that was live when it
//!   was scheduled.
//! - `Foreground` commits a failure whose deadline already passed (the
//!   process may have been suspended before the deferred check could run),
//!   cancels one that is still pending, then asks for a resync.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::events::CancelReason;

pub const MIN_GRACE_WINDOW_MS: u64 = 300;
pub const MAX_GRACE_WINDOW_MS: u64 = 3_000;
pub const DEFAULT_GRACE_WINDOW_MS: u64 = 1_000;

/// Host signals, in the order the host observed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "locked")]
pub enum LifecycleEvent {
    Foreground,
    Background,
    Inactive,
    LockChanged(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppPhase {
    Active,
    Inactive,
    Background,
}

/// A background failure waiting for its grace window to run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFailure {
    pub run_id: Uuid,
    pub deadline: DateTime<Utc>,
}

/// What the owner of the timer should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Recompute the countdown against the wall clock.
    Resync,
    /// Fail the run: the user left the app.
    Fail { run_id: Uuid },
    FailureScheduled { run_id: Uuid, deadline: DateTime<Utc> },
    FailureCancelled { run_id: Uuid, reason: CancelReason },
}

#[derive(Debug, Clone)]
pub struct LifecycleArbiter {
    phase: AppPhase,
    locked: bool,
    grace_window: Duration,
    pending: Option<PendingFailure>,
}

impl LifecycleArbiter {
    /// `grace_window_ms` is clamped to
    /// [`MIN_GRACE_WINDOW_MS`]..=[`MAX_GRACE_WINDOW_MS`].
    pub fn new(grace_window_ms: u64) -> Self {
        let ms = grace_window_ms.clamp(MIN_GRACE_WINDOW_MS, MAX_GRACE_WINDOW_MS);
        Self {
            phase: AppPhase::Active,
            locked: false,
            grace_window: Duration::milliseconds(ms as i64),
            pending: None,
        }
    }

    pub fn phase(&self) -> AppPhase {
        self.phase
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn grace_window(&self) -> Duration {
        self.grace_window
    }

    pub fn pending(&self) -> Option<&PendingFailure> {
        self.pending.as_ref()
    }

    /// When [`Self::poll`] next has something to decide.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.map(|p| p.deadline)
    }

    /// Apply one host signal. `running` is the live run, if any.
    pub fn handle(
        &mut self,
        event: LifecycleEvent,
        running: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Vec<Directive> {
        match event {
            LifecycleEvent::LockChanged(locked) => {
                self.locked = locked;
                match self.pending.take() {
                    Some(p) if locked => {
                        debug!(run_id = %p.run_id, "lock signal inside grace window");
                        vec![Directive::FailureCancelled {
                            run_id: p.run_id,
                            reason: CancelReason::DeviceLocked,
                        }]
                    }
                    other => {
                        self.pending = other;
                        if !locked && self.phase == AppPhase::Background {
                            // Unlocked into another app: the lock no longer covers it.
                            self.on_background(running, now)
                        } else {
                            Vec::new()
                        }
                    }
                }
            }
            LifecycleEvent::Inactive => {
                self.phase = AppPhase::Inactive;
                Vec::new()
            }
            LifecycleEvent::Background => {
                self.phase = AppPhase::Background;
                self.on_background(running, now)
            }
            LifecycleEvent::Foreground => {
                self.phase = AppPhase::Active;
                let mut out = self.poll(running, now);
                if let Some(p) = self.pending.take() {
                    out.push(Directive::FailureCancelled {
                        run_id: p.run_id,
                        reason: CancelReason::Foreground,
                    });
                }
                if running.is_some() {
                    out.push(Directive::Resync);
                }
                out
            }
        }
    }

    /// Settle a pending failure whose deadline has been reached.
    pub fn poll(&mut self, running: Option<Uuid>, now: DateTime<Utc>) -> Vec<Directive> {
        let due = matches!(self.pending, Some(p) if p.deadline <= now);
        if !due {
            return Vec::new();
        }
        let Some(p) = self.pending.take() else {
            return Vec::new();
        };

        if self.locked {
            return vec![Directive::FailureCancelled {
                run_id: p.run_id,
                reason: CancelReason::DeviceLocked,
            }];
        }
        if running != Some(p.run_id) {
            return vec![Directive::FailureCancelled {
                run_id: p.run_id,
                reason: CancelReason::Stale,
            }];
        }
        vec![Directive::Fail { run_id: p.run_id }]
    }

    fn on_background(&mut self, running: Option<Uuid>, now: DateTime<Utc>) -> Vec<Directive> {
        let Some(run_id) = running else {
            debug!("background with no live run");
            return Vec::new();
        };
        if self.locked {
            debug!(%run_id, "background while locked; run continues");
            return Vec::new();
        }
        if matches!(self.pending, Some(p) if p.run_id == run_id) {
            // Already counting down; a repeated signal must not extend it.
            return Vec::new();
        }

        let deadline = now + self.grace_window;
        let mut out = Vec::new();
        if let Some(stale) = self.pending.replace(PendingFailure { run_id, deadline }) {
            out.push(Directive::FailureCancelled {
                run_id: stale.run_id,
                reason: CancelReason::Stale,
            });
        }
        out.push(Directive::FailureScheduled { run_id, deadline });
        out
    }
}
