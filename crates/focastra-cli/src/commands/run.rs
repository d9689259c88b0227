//! Interactive host: launch the session service, then feed it lifecycle
//! signals read from stdin, one per line.
//!
//! ```text
//! fg | bg | inactive | lock | unlock
//! start [MINUTES] [SESSION_ID]
//! end | ack | status | quit
//! ```
//!
//! Every event is printed to stdout as one JSON line.

use std::time::Duration;

use clap::Args;
use focastra_core::storage::SessionConfig;
use focastra_core::{Clock, Command, Config, Event, FocusRuntime, FocusService, LifecycleEvent, SystemClock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Args)]
pub struct RunArgs {
    /// Duration in minutes, one of `session.duration_options`
    /// (default from config)
    #[arg(long)]
    duration: Option<u32>,
    /// Scheduled session to link the run to
    #[arg(long)]
    session: Option<Uuid>,
    /// Launch without starting a run
    #[arg(long)]
    no_start: bool,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    if !args.no_start {
        let minutes = args
            .duration
            .unwrap_or(config.session.default_duration_minutes);
        config.session.check_duration(minutes)?;
    }
    let store = super::open_store()?;
    let clock = SystemClock;

    let service = FocusService::launch(store, &config, clock.now());
    for event in &service.recovery().events {
        print_event(event)?;
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = rt.block_on(drive(service, clock, &config, args));
    // Stdin reads block a worker thread; do not wait for them.
    rt.shutdown_background();
    result
}

async fn drive(
    service: FocusService<focastra_core::Database>,
    clock: SystemClock,
    config: &Config,
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let default_duration = args
        .duration
        .unwrap_or(config.session.default_duration_minutes);
    let runtime = FocusRuntime::new(
        service,
        clock,
        Duration::from_millis(config.lifecycle.tick_interval_ms),
    );

    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
    let driver = tokio::spawn(runtime.run(cmd_rx, ev_tx));

    if !args.no_start {
        cmd_tx
            .send(Command::Start {
                duration_minutes: default_duration,
                scheduled_session_id: args.session,
            })
            .await?;
    }
    tokio::spawn(read_commands(cmd_tx, default_duration, config.session.clone()));

    while let Some(event) = ev_rx.recv().await {
        print_event(&event)?;
    }
    driver.await?;
    Ok(())
}

async fn read_commands(
    commands: mpsc::Sender<Command>,
    default_duration: u32,
    session: SessionConfig,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let parsed = parse_line(&line, default_duration).and_then(|command| {
            if let Some(Command::Start { duration_minutes, .. }) = &command {
                session
                    .check_duration(*duration_minutes)
                    .map_err(|e| e.to_string())?;
            }
            Ok(command)
        });
        match parsed {
            Ok(Some(command)) => {
                let quit = command == Command::Shutdown;
                if commands.send(command).await.is_err() || quit {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("error: {e}"),
        }
    }
}

fn print_event(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

fn parse_line(line: &str, default_duration: u32) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let command = match verb {
        "fg" | "foreground" => Command::Lifecycle(LifecycleEvent::Foreground),
        "bg" | "background" => Command::Lifecycle(LifecycleEvent::Background),
        "inactive" => Command::Lifecycle(LifecycleEvent::Inactive),
        "lock" => Command::Lifecycle(LifecycleEvent::LockChanged(true)),
        "unlock" => Command::Lifecycle(LifecycleEvent::LockChanged(false)),
        "start" => {
            let duration_minutes = match words.next() {
                Some(n) => n
                    .parse::<u32>()
                    .map_err(|_| format!("invalid duration: {n}"))?,
                None => default_duration,
            };
            let scheduled_session_id = match words.next() {
                Some(id) => Some(
                    Uuid::parse_str(id).map_err(|_| format!("invalid session id: {id}"))?,
                ),
                None => None,
            };
            Command::Start {
                duration_minutes,
                scheduled_session_id,
            }
        }
        "end" => Command::EndEarly,
        "ack" => Command::Acknowledge,
        "status" => Command::Status,
        "quit" | "exit" => Command::Shutdown,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_lifecycle_words() {
        assert_eq!(
            parse_line("bg", 30),
            Ok(Some(Command::Lifecycle(LifecycleEvent::Background)))
        );
        assert_eq!(
            parse_line("  lock ", 30),
            Ok(Some(Command::Lifecycle(LifecycleEvent::LockChanged(true))))
        );
        assert_eq!(parse_line("", 30), Ok(None));
        assert_eq!(parse_line("quit", 30), Ok(Some(Command::Shutdown)));
    }

    #[test]
    fn parse_start_arguments() {
        assert_eq!(
            parse_line("start", 25),
            Ok(Some(Command::Start {
                duration_minutes: 25,
                scheduled_session_id: None
            }))
        );
        let id = Uuid::new_v4();
        assert_eq!(
            parse_line(&format!("start 60 {id}"), 25),
            Ok(Some(Command::Start {
                duration_minutes: 60,
                scheduled_session_id: Some(id)
            }))
        );
        assert!(parse_line("start soon", 25).is_err());
        assert!(parse_line("start 5 not-a-uuid", 25).is_err());
    }

    #[test]
    fn unknown_words_are_errors() {
        assert!(parse_line("pause", 30).is_err());
    }
}
