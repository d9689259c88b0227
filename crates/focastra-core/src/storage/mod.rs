mod config;
pub mod database;
pub mod kv;
pub mod session_store;

pub use config::{Config, LifecycleConfig, SessionConfig};
pub use database::Database;
pub use kv::{KvBackend, MemoryKv};
pub use session_store::SessionStore;

use std::path::PathBuf;

use crate::error::StoreError;

/// Returns the data directory, creating it when missing.
///
/// `FOCASTRA_DATA_DIR` wins when set. Otherwise `~/.config/focastra[-dev]/`
/// based on FOCASTRA_ENV (set FOCASTRA_ENV=dev for the development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dir = match std::env::var_os("FOCASTRA_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCASTRA_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focastra-dev")
            } else {
                base_dir.join("focastra")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StoreError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
