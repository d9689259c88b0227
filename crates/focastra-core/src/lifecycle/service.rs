//! The session-lifecycle service a host owns for the life of its process.
//!
//! [`FocusService`] is the effectful layer around the pure pieces: it feeds
//! host signals to the [`LifecycleArbiter`], drives the [`TimerEngine`],
//! and writes every decision through the [`SessionStore`] before returning.
//!
//! The only way to obtain one is [`FocusService::launch`], which runs
//! [`RecoveryProcedure`] first. No lifecycle event can therefore be seen
//! before a run left behind by a previous process has been settled.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::arbiter::{Directive, LifecycleArbiter, LifecycleEvent};
use super::recovery::{RecoveryProcedure, RecoveryReport};
use crate::events::{Event, FailureReason};
use crate::schedule::{self, ScheduleManager};
use crate::session::{CurrentSessionSnapshot, SessionOutcome};
use crate::storage::{Config, KvBackend, SessionStore};
use crate::timer::TimerEngine;

pub struct FocusService<B: KvBackend> {
    store: SessionStore<B>,
    engine: TimerEngine,
    arbiter: LifecycleArbiter,
    /// In-memory copy of the persisted snapshot; authoritative for this
    /// process even if a write fails.
    snapshot: Option<CurrentSessionSnapshot>,
    recovery: RecoveryReport,
}

impl<B: KvBackend> FocusService<B> {
    /// Run launch recovery against `store` and return the ready service.
    pub fn launch(store: SessionStore<B>, config: &Config, now: DateTime<FixedOffset>) -> Self {
        let recovery =
            RecoveryProcedure::new(&store, config.session.default_duration_minutes).run(&now);

        let mut engine = TimerEngine::new();
        let snapshot = recovery.snapshot().cloned();
        if let Some(outcome) = snapshot.as_ref().and_then(|s| s.outcome()) {
            engine.present(outcome);
        }

        Self {
            store,
            engine,
            arbiter: LifecycleArbiter::new(config.lifecycle.grace_window_ms),
            snapshot,
            recovery,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_focusing(&self) -> bool {
        self.engine.is_focusing()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.engine.remaining_secs()
    }

    pub fn session_complete(&self) -> bool {
        self.engine.session_complete()
    }

    pub fn succeeded(&self) -> bool {
        self.engine.succeeded()
    }

    pub fn snapshot(&self) -> Option<&CurrentSessionSnapshot> {
        self.snapshot.as_ref()
    }

    /// What launch recovery did for this process.
    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn arbiter(&self) -> &LifecycleArbiter {
        &self.arbiter
    }

    pub fn store(&self) -> &SessionStore<B> {
        &self.store
    }

    pub fn schedule(&self) -> ScheduleManager<'_, B> {
        ScheduleManager::new(&self.store)
    }

    /// When the pending background failure, if any, is due.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.arbiter.next_deadline()
    }

    pub fn state_snapshot(&self, now: DateTime<FixedOffset>) -> Event {
        self.engine.snapshot(now.with_timezone(&Utc))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a run, optionally linked to a scheduled session.
    ///
    /// Returns `None` without changing anything when a run is already
    /// live, the duration is zero, or the linked session cannot be started
    /// now. A link that does not resolve is tolerated.
    pub fn start(
        &mut self,
        duration_minutes: u32,
        scheduled_session_id: Option<Uuid>,
        now: DateTime<FixedOffset>,
    ) -> Option<Event> {
        if self.engine.is_focusing() || self.snapshot.as_ref().is_some_and(|s| s.is_active) {
            debug!("start ignored: a run is already live");
            return None;
        }
        if let Some(id) = scheduled_session_id {
            match self.schedule().find(id) {
                Some(session) if !schedule::can_start(&session, &now) => {
                    debug!(%id, status = ?session.status, "start ignored: session not startable now");
                    return None;
                }
                Some(_) => {}
                None => warn!(%id, "linked session not in catalog; starting anyway"),
            }
        }

        let at = now.with_timezone(&Utc);
        let run_id = self.engine.start(duration_minutes, at)?;
        let end_date = self.engine.end_date()?;
        let snapshot = CurrentSessionSnapshot::begin(run_id, end_date, scheduled_session_id);
        self.persist_snapshot(Some(&snapshot));
        self.persist_marker();
        self.snapshot = Some(snapshot);

        info!(%run_id, duration_minutes, ?scheduled_session_id, "focus run started");
        Some(Event::SessionStarted {
            run_id,
            scheduled_session_id,
            duration_minutes,
            end_date,
            at,
        })
    }

    /// Feed one host lifecycle signal.
    pub fn handle(&mut self, event: LifecycleEvent, now: DateTime<FixedOffset>) -> Vec<Event> {
        let at = now.with_timezone(&Utc);
        debug!(?event, "lifecycle signal");
        let directives = self
            .arbiter
            .handle(event, self.engine.running_run_id(), at);
        self.apply(directives, at)
    }

    /// Periodic refresh: settles a due background failure, then recomputes
    /// the countdown.
    pub fn tick(&mut self, now: DateTime<FixedOffset>) -> Vec<Event> {
        let at = now.with_timezone(&Utc);
        let directives = self.arbiter.poll(self.engine.running_run_id(), at);
        let mut events = self.apply(directives, at);
        if let Some(outcome) = self.engine.tick(at) {
            events.extend(self.conclude(outcome, None, at));
        }
        events
    }

    /// The user gave up on the live run.
    pub fn end_early(&mut self, now: DateTime<FixedOffset>) -> Vec<Event> {
        match self.engine.end_early() {
            Some(outcome) => {
                self.conclude(outcome, Some(FailureReason::EndedEarly), now.with_timezone(&Utc))
            }
            None => Vec::new(),
        }
    }

    /// Clear a terminal snapshot once the host has shown its outcome.
    ///
    /// Returns the cleared snapshot; does nothing while a run is live.
    pub fn acknowledge(&mut self) -> Option<CurrentSessionSnapshot> {
        if !self.snapshot.as_ref().is_some_and(|s| s.is_terminal()) {
            return None;
        }
        let cleared = self.snapshot.take();
        self.persist_snapshot(None);
        self.engine.reset();
        cleared
    }

    pub fn into_store(self) -> SessionStore<B> {
        self.store
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply(&mut self, directives: Vec<Directive>, at: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        for directive in directives {
            match directive {
                Directive::Resync => {
                    if let Some(outcome) = self.engine.resync(at) {
                        events.extend(self.conclude(outcome, None, at));
                    }
                }
                Directive::Fail { run_id } => {
                    if self.engine.running_run_id() != Some(run_id) {
                        continue;
                    }
                    if let Some(outcome) = self.engine.end_early() {
                        events.extend(self.conclude(outcome, Some(FailureReason::LeftApp), at));
                    }
                }
                Directive::FailureScheduled { run_id, deadline } => {
                    debug!(%run_id, %deadline, "background failure scheduled");
                    events.push(Event::FailureScheduled {
                        run_id,
                        deadline,
                        at,
                    });
                }
                Directive::FailureCancelled { run_id, reason } => {
                    debug!(%run_id, ?reason, "background failure cancelled");
                    events.push(Event::FailureCancelled { run_id, reason, at });
                }
            }
        }
        events
    }

    /// Apply a terminal outcome to the snapshot and the linked session.
    /// Only the first call per run has any effect.
    fn conclude(
        &mut self,
        outcome: SessionOutcome,
        reason: Option<FailureReason>,
        at: DateTime<Utc>,
    ) -> Vec<Event> {
        let Some(snapshot) = self.snapshot.as_mut() else {
            return Vec::new();
        };
        if !snapshot.conclude(outcome) {
            return Vec::new();
        }
        let snapshot = snapshot.clone();
        self.persist_snapshot(Some(&snapshot));
        self.persist_marker();

        if let Some(id) = snapshot.scheduled_session_id {
            if let Err(e) = self.schedule().mark_outcome(id, outcome.status()) {
                error!(%id, error = %e, "could not persist session outcome");
            }
        }

        info!(run_id = %snapshot.run_id, ?outcome, ?reason, "focus run finished");
        vec![Event::SessionTerminal {
            run_id: snapshot.run_id,
            outcome,
            reason,
            scheduled_session_id: snapshot.scheduled_session_id,
            at,
        }]
    }

    fn persist_snapshot(&self, snapshot: Option<&CurrentSessionSnapshot>) {
        if let Err(e) = self.store.save_snapshot(snapshot) {
            error!(error = %e, "could not persist current session");
        }
    }

    fn persist_marker(&self) {
        if let Err(e) = self.store.save_marker(&self.engine.fallback_marker()) {
            error!(error = %e, "could not persist timer marker");
        }
    }
}
