//! Async driver for a live [`FocusService`].
//!
//! The service itself is synchronous and clock-agnostic. [`FocusRuntime`]
//! supplies the two things a host would otherwise have to: a periodic
//! refresh, and a wake-up at the pending background-failure deadline so a
//! failure is committed even when nothing else happens.
//!
//! Commands arrive on an `mpsc` channel in the order the host observed
//! them; every resulting [`Event`] goes out on an unbounded channel.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::events::Event;
use crate::lifecycle::{FocusService, LifecycleEvent};
use crate::storage::KvBackend;

/// Host input to a running [`FocusRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lifecycle(LifecycleEvent),
    Start {
        duration_minutes: u32,
        scheduled_session_id: Option<Uuid>,
    },
    EndEarly,
    Acknowledge,
    /// Emit a `StateSnapshot`.
    Status,
    Shutdown,
}

pub struct FocusRuntime<B: KvBackend, C: Clock> {
    service: FocusService<B>,
    clock: C,
    tick_interval: Duration,
}

impl<B: KvBackend, C: Clock> FocusRuntime<B, C> {
    pub fn new(service: FocusService<B>, clock: C, tick_interval: Duration) -> Self {
        Self {
            service,
            clock,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn service(&self) -> &FocusService<B> {
        &self.service
    }

    /// Process commands until `Shutdown` or until every sender is dropped,
    /// then hand the service back.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        events: mpsc::UnboundedSender<Event>,
    ) -> FocusService<B> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_ms = self.tick_interval.as_millis() as u64, "focus runtime started");

        loop {
            let grace_wait = self.until_next_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.dispatch(command, &events),
                },
                _ = ticker.tick() => {
                    let batch = self.service.tick(self.clock.now());
                    emit(&events, batch);
                }
                _ = tokio::time::sleep(grace_wait.unwrap_or(Duration::ZERO)), if grace_wait.is_some() => {
                    debug!("grace deadline reached");
                    let batch = self.service.tick(self.clock.now());
                    emit(&events, batch);
                }
            }
        }

        info!("focus runtime stopped");
        self.service
    }

    fn dispatch(&mut self, command: Command, events: &mpsc::UnboundedSender<Event>) {
        let now = self.clock.now();
        let batch = match command {
            Command::Lifecycle(event) => self.service.handle(event, now),
            Command::Start {
                duration_minutes,
                scheduled_session_id,
            } => self
                .service
                .start(duration_minutes, scheduled_session_id, now)
                .into_iter()
                .collect(),
            Command::EndEarly => self.service.end_early(now),
            Command::Acknowledge => {
                self.service.acknowledge();
                vec![self.service.state_snapshot(now)]
            }
            Command::Status => vec![self.service.state_snapshot(now)],
            Command::Shutdown => Vec::new(),
        };
        emit(events, batch);
    }

    fn until_next_deadline(&self) -> Option<Duration> {
        let deadline = self.service.next_deadline()?;
        Some(
            (deadline - self.clock.now_utc())
                .to_std()
                .unwrap_or(Duration::ZERO),
        )
    }
}

fn emit(events: &mpsc::UnboundedSender<Event>, batch: Vec<Event>) {
    for event in batch {
        if events.send(event).is_err() {
            debug!("event receiver dropped");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FailureReason;
    use crate::session::SessionOutcome;
    use crate::storage::{Config, MemoryKv, SessionStore};
    use chrono::{DateTime, FixedOffset, TimeZone};

    /// Wall clock that follows tokio's (paused) time.
    struct TokioClock {
        base: DateTime<FixedOffset>,
        origin: tokio::time::Instant,
    }

    impl TokioClock {
        fn new() -> Self {
            Self {
                base: FixedOffset::east_opt(0)
                    .unwrap()
                    .with_ymd_and_hms(2026, 6, 15, 9, 0, 0)
                    .unwrap(),
                origin: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<FixedOffset> {
            let elapsed = tokio::time::Instant::now() - self.origin;
            self.base + chrono::Duration::from_std(elapsed).unwrap()
        }
    }

    type Harness = (
        mpsc::Sender<Command>,
        mpsc::UnboundedReceiver<Event>,
        tokio::task::JoinHandle<FocusService<MemoryKv>>,
    );

    fn spawn(tick: Duration) -> Harness {
        let clock = TokioClock::new();
        let service = FocusService::launch(
            SessionStore::new(MemoryKv::new()),
            &Config::default(),
            clock.now(),
        );
        let runtime = FocusRuntime::new(service, clock, tick);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(runtime.run(cmd_rx, ev_tx));
        (cmd_tx, ev_rx, handle)
    }

    async fn next_terminal(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        loop {
            match events.recv().await {
                Some(event @ Event::SessionTerminal { .. }) => return event,
                Some(_) => continue,
                None => panic!("runtime stopped before a terminal event"),
            }
        }
    }

    fn start(minutes: u32) -> Command {
        Command::Start {
            duration_minutes: minutes,
            scheduled_session_id: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn grace_deadline_fires_without_a_tick() {
        // Ticks far apart so only the deadline wake-up can fail the run.
        let (commands, mut events, handle) = spawn(Duration::from_secs(3600));
        commands.send(start(30)).await.unwrap();
        commands
            .send(Command::Lifecycle(LifecycleEvent::Background))
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        let terminal = next_terminal(&mut events).await;
        assert!(matches!(
            terminal,
            Event::SessionTerminal {
                outcome: SessionOutcome::Failed,
                reason: Some(FailureReason::LeftApp),
                ..
            }
        ));
        assert!(started.elapsed() <= Duration::from_millis(1_100));

        commands.send(Command::Shutdown).await.unwrap();
        let service = handle.await.unwrap();
        assert!(service.session_complete());
        assert!(!service.succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn lock_signal_keeps_run_alive_until_completion() {
        let (commands, mut events, handle) = spawn(Duration::from_secs(1));
        commands.send(start(1)).await.unwrap();
        commands
            .send(Command::Lifecycle(LifecycleEvent::Background))
            .await
            .unwrap();
        commands
            .send(Command::Lifecycle(LifecycleEvent::LockChanged(true)))
            .await
            .unwrap();

        let terminal = next_terminal(&mut events).await;
        assert!(matches!(
            terminal,
            Event::SessionTerminal {
                outcome: SessionOutcome::Succeeded,
                ..
            }
        ));

        drop(commands);
        let service = handle.await.unwrap();
        assert!(service.succeeded());
        assert!(service.store().load_snapshot().unwrap().did_succeed);
    }

    #[tokio::test(start_paused = true)]
    async fn status_and_acknowledge_report_state() {
        let (commands, mut events, handle) = spawn(Duration::from_secs(1));
        commands.send(start(5)).await.unwrap();
        commands.send(Command::EndEarly).await.unwrap();
        next_terminal(&mut events).await;

        commands.send(Command::Acknowledge).await.unwrap();
        let snapshot = loop {
            if let Some(event @ Event::StateSnapshot { .. }) = events.recv().await {
                break event;
            }
        };
        assert!(matches!(
            snapshot,
            Event::StateSnapshot {
                is_focusing: false,
                session_complete: false,
                ..
            }
        ));

        commands.send(Command::Shutdown).await.unwrap();
        let service = handle.await.unwrap();
        assert!(service.snapshot().is_none());
    }
}
