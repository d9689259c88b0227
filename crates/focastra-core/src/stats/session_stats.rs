//! Outcome statistics over the session catalog
//!
//! Only finished entries (`completed` or `failed`) count. Streaks follow the
//! catalog in scheduled order, so a failure anywhere breaks the run of
//! completions that precedes it.

use serde::{Deserialize, Serialize};

use crate::session::{ScheduledSession, SessionStatus};

/// Aggregate outcome figures for a set of scheduled sessions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Sessions that ran to the end
    pub completed: u32,
    /// Sessions that ended in failure
    pub failed: u32,
    /// `completed + failed`
    pub finished: u32,
    /// Completed share of finished sessions, rounded percent (0 when none)
    pub success_rate_pct: u32,
    /// Sum of planned minutes over completed sessions
    pub total_focus_minutes: u64,
    /// Completions in a row, counting back from the latest finished session
    pub current_streak: u32,
    /// Longest run of completions
    pub best_streak: u32,
}

impl SessionStats {
    pub fn from_sessions(sessions: &[ScheduledSession]) -> Self {
        let mut finished: Vec<&ScheduledSession> =
            sessions.iter().filter(|s| s.status.is_terminal()).collect();
        finished.sort_by_key(|s| s.scheduled_date);

        let mut stats = Self::default();
        let mut run = 0u32;
        for session in &finished {
            match session.status {
                SessionStatus::Completed => {
                    stats.completed += 1;
                    stats.total_focus_minutes += u64::from(session.duration_minutes);
                    run += 1;
                    stats.best_streak = stats.best_streak.max(run);
                }
                SessionStatus::Failed => {
                    stats.failed += 1;
                    run = 0;
                }
                SessionStatus::Scheduled => {}
            }
        }

        stats.current_streak = run;
        stats.finished = stats.completed + stats.failed;
        if stats.finished > 0 {
            stats.success_rate_pct =
                ((f64::from(stats.completed) / f64::from(stats.finished)) * 100.0).round() as u32;
        }
        stats
    }
}
