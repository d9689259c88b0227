//! # Focastra Core Library
//!
//! This library provides the core business logic for the Focastra focus timer:
//! scheduled focus sessions that fail when the user leaves the app, and a
//! launch-time recovery that settles runs interrupted by a killed process.
//! All operations are available via a standalone CLI binary that acts as the
//! host.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine; remaining time is
//!   always recomputed from the persisted end instant
//! - **Lifecycle**: A pure arbiter for background/lock signals, the launch
//!   recovery procedure, and the service that persists every decision
//! - **Storage**: SQLite-backed key/value records and TOML-based configuration
//! - **Runtime**: A tokio driver that ticks the service and wakes it at the
//!   background-failure deadline
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`FocusService`]: Session lifecycle owner, obtained only via launch recovery
//! - [`SessionStore`]: Persistence of the catalog, snapshot and marker
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod runtime;
pub mod schedule;
pub mod session;
pub mod stats;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use events::{CancelReason, Event, FailureReason, RecoverySource};
pub use lifecycle::{FocusService, LifecycleArbiter, LifecycleEvent, RecoveryProcedure, RecoveryReport};
pub use runtime::{Command, FocusRuntime};
pub use schedule::ScheduleManager;
pub use session::{CurrentSessionSnapshot, FallbackMarker, ScheduledSession, SessionOutcome, SessionStatus};
pub use stats::SessionStats;
pub use storage::{Config, Database, KvBackend, MemoryKv, SessionStore};
pub use timer::{TimerEngine, TimerState};
