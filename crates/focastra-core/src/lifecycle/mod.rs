//! Session lifecycle: background/lock policy, launch recovery, and the
//! service that owns a live run.

mod arbiter;
mod recovery;
mod service;

pub use arbiter::{
    AppPhase, Directive, LifecycleArbiter, LifecycleEvent, PendingFailure,
    DEFAULT_GRACE_WINDOW_MS, MAX_GRACE_WINDOW_MS, MIN_GRACE_WINDOW_MS,
};
pub use recovery::{RecoveredFailure, RecoveryProcedure, RecoveryReport};
pub use service::FocusService;
