use focastra_core::SessionStats;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store()?;
    let stats = SessionStats::from_sessions(&store.load_sessions());
    super::print_json(&stats)
}
