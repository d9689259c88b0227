use chrono::{NaiveDate, NaiveTime};
use clap::Subcommand;
use focastra_core::{Clock, Config, ScheduleManager, SystemClock};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Plan sessions at one time of day on the given dates
    Plan {
        /// Date (YYYY-MM-DD); repeat for several days
        #[arg(long = "date", required = true)]
        dates: Vec<NaiveDate>,
        /// Start time (HH:MM, local)
        #[arg(long, value_parser = parse_time)]
        time: NaiveTime,
        /// Duration in minutes, one of `session.duration_options`
        /// (default from config)
        #[arg(long)]
        duration: Option<u32>,
    },
    /// List the session catalog as JSON
    List,
    /// Print the next session still to start today, or null
    Next,
    /// Remove sessions from earlier today that were never started
    Purge,
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM: {e}"))
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store()?;
    let schedule = ScheduleManager::new(&store);
    let now = SystemClock.now();

    match action {
        SessionAction::Plan {
            dates,
            time,
            duration,
        } => {
            let session = Config::load_or_default().session;
            let duration =
                session.check_duration(duration.unwrap_or(session.default_duration_minutes))?;
            let planned = schedule.plan(&dates, time, duration, &now)?;
            super::print_json(&planned)?;
        }
        SessionAction::List => {
            super::print_json(&schedule.sessions())?;
        }
        SessionAction::Next => {
            super::print_json(&schedule.next_session_for_today(&now))?;
        }
        SessionAction::Purge => {
            let purged = schedule.purge_missed(&now)?;
            super::print_json(&serde_json::json!({ "purged": purged }))?;
        }
    }
    Ok(())
}
