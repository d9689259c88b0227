//! TOML-based application configuration.
//!
//! Stores:
//! - Lifecycle tuning (background grace window, refresh interval)
//! - Session defaults (duration shown for recovered runs, picker options)
//!
//! Configuration is stored at `~/.config/focastra/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, ValidationError};

/// Background/lock handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Delay before a background transition without a lock signal fails
    /// the run. Clamped when used.
    #[serde(default = "default_grace_window_ms")]
    pub grace_window_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Session defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: u32,
    #[serde(default = "default_duration_options")]
    pub duration_options: Vec<u32>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focastra/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

// Default functions
fn default_grace_window_ms() -> u64 {
    1_000
}
fn default_tick_interval_ms() -> u64 {
    1_000
}
fn default_duration_minutes() -> u32 {
    30
}
fn default_duration_options() -> Vec<u32> {
    vec![1, 30, 60, 90, 120, 150, 180, 210]
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grace_window_ms: default_grace_window_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: default_duration_minutes(),
            duration_options: default_duration_options(),
        }
    }
}

impl SessionConfig {
    /// Accept `minutes` if it is one of `duration_options`.
    /// An empty option list accepts any positive duration.
    ///
    /// # Errors
    /// Rejects zero and durations that are not offered.
    pub fn check_duration(&self, minutes: u32) -> Result<u32, ValidationError> {
        if minutes == 0 {
            return Err(ValidationError::ZeroDuration);
        }
        if !self.duration_options.is_empty() && !self.duration_options.contains(&minutes) {
            return Err(ValidationError::DurationNotOffered {
                minutes,
                offered: self.duration_options.clone(),
            });
        }
        Ok(minutes)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Location of `config.toml` in the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Like [`Config::load`], for an explicit file.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    ///
    /// See [`Config::save`].
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or is out of range.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.lifecycle.tick_interval_ms == 0 {
            return Err(invalid("lifecycle.tick_interval_ms", "must be positive"));
        }
        if self.session.default_duration_minutes == 0 {
            return Err(invalid("session.default_duration_minutes", "must be positive"));
        }
        if self.session.duration_options.contains(&0) {
            return Err(invalid("session.duration_options", "durations must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let parsed: Config = toml::from_str("[lifecycle]\ngrace_window_ms = 2000\n").unwrap();
        assert_eq!(parsed.lifecycle.grace_window_ms, 2000);
        assert_eq!(parsed.lifecycle.tick_interval_ms, 1000);
        assert_eq!(parsed.session, SessionConfig::default());
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.lifecycle.grace_window_ms, 1000);
        assert_eq!(cfg.lifecycle.tick_interval_ms, 1000);
        assert_eq!(cfg.session.default_duration_minutes, 30);
        assert_eq!(
            cfg.session.duration_options,
            vec![1, 30, 60, 90, 120, 150, 180, 210]
        );
    }

    #[test]
    fn durations_must_be_offered() {
        let mut cfg = SessionConfig::default();
        assert_eq!(cfg.check_duration(60), Ok(60));
        assert_eq!(cfg.check_duration(1), Ok(1));
        assert_eq!(cfg.check_duration(0), Err(ValidationError::ZeroDuration));
        assert!(matches!(
            cfg.check_duration(45),
            Err(ValidationError::DurationNotOffered { minutes: 45, .. })
        ));

        cfg.duration_options.clear();
        assert_eq!(cfg.check_duration(45), Ok(45));
        assert_eq!(cfg.check_duration(0), Err(ValidationError::ZeroDuration));
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("lifecycle.grace_window_ms").as_deref(), Some("1000"));
        assert_eq!(
            cfg.get("session.duration_options").as_deref(),
            Some("[1,30,60,90,120,150,180,210]")
        );
        assert!(cfg.get("session.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn apply_updates_nested_number() {
        let mut cfg = Config::default();
        cfg.apply("lifecycle.grace_window_ms", "2500").unwrap();
        assert_eq!(cfg.lifecycle.grace_window_ms, 2500);
    }

    #[test]
    fn apply_updates_array() {
        let mut cfg = Config::default();
        cfg.apply("session.duration_options", "[5, 10]").unwrap();
        assert_eq!(cfg.session.duration_options, vec![5, 10]);
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.apply("session.nonexistent_key", "1").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
        let err = cfg.apply("nope.deeper", "1").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
    }

    #[test]
    fn apply_rejects_invalid_values() {
        let mut cfg = Config::default();
        let err = cfg.apply("lifecycle.tick_interval_ms", "soon").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        let err = cfg.apply("session.default_duration_minutes", "0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.apply("session.default_duration_minutes", "45").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), changed);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "lifecycle = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseFailed(_))
        ));
    }
}
