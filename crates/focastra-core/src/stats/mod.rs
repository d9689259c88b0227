//! Statistics module for Focastra
//!
//! Outcome analytics over the scheduled-session catalog.

mod session_stats;

pub use session_stats::SessionStats;
