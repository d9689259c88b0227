//! `focastra-cli config ...`: read and edit `config.toml` by dotted key.

use clap::Subcommand;
use focastra_core::{Config, ConfigError};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value, e.g. `lifecycle.grace_window_ms`
    Get { key: String },
    /// Validate and store one value; prints the stored value
    Set { key: String, value: String },
    /// Print the whole configuration as JSON
    List,
    /// Print where the configuration file lives
    Path,
    /// Overwrite the file with defaults and print them
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => println!("{}", lookup(&Config::load()?, &key)?),
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            println!("{key} = {}", lookup(&config, &key)?);
        }
        ConfigAction::List => super::print_json(&Config::load()?)?,
        ConfigAction::Path => println!("{}", Config::path()?.display()),
        ConfigAction::Reset => {
            let defaults = Config::default();
            defaults.save()?;
            super::print_json(&defaults)?;
        }
    }
    Ok(())
}

fn lookup(config: &Config, key: &str) -> Result<String, ConfigError> {
    config
        .get(key)
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
}
