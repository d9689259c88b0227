pub mod config;
pub mod recover;
pub mod run;
pub mod session;
pub mod stats;
pub mod status;

use focastra_core::storage::{Database, SessionStore};
use serde::Serialize;

/// Open the session store in the data directory.
pub fn open_store() -> Result<SessionStore<Database>, Box<dyn std::error::Error>> {
    Ok(SessionStore::new(Database::open()?))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
