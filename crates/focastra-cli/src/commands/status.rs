use focastra_core::{Clock, ScheduleManager, SystemClock};

/// Prints what is persisted without running recovery, so a dangling run
/// from a dead process shows up as still active.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store()?;
    let now = SystemClock.now();
    let next = ScheduleManager::new(&store).next_session_for_today(&now);
    let status = serde_json::json!({
        "current_session": store.load_snapshot(),
        "timer_marker": store.load_marker(),
        "next_session": next,
        "now": now,
    });
    super::print_json(&status)
}
