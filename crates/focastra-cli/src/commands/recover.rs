use focastra_core::{Clock, Config, RecoveryProcedure, SystemClock};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store = super::open_store()?;
    let report = RecoveryProcedure::new(&store, config.session.default_duration_minutes)
        .run(&SystemClock.now());
    super::print_json(&report)
}
