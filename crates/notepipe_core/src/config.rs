//! Runtime configuration for the notes core.
//!
//! # Responsibility
//! - Describe where notes are stored and whether first-run seed data is
//!   written.
//! - Carry logging settings handed to `logging::init_logging`.
//!
//! # Invariants
//! - Defaults are usable without any environment: in-memory store, seeding
//!   enabled, logging left to the embedder.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "NOTEPIPE_DB_PATH";
pub const ENV_SEED: &str = "NOTEPIPE_SEED";
pub const ENV_LOG_LEVEL: &str = "NOTEPIPE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "NOTEPIPE_LOG_DIR";

const MEMORY_LOCATION: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for `{key}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Physical location of the note table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: StoreLocation,
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
        }
    }

    pub fn memory() -> Self {
        Self {
            location: StoreLocation::Memory,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::memory()
    }
}

/// Composition-root configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub store: StoreConfig,
    /// Insert placeholder notes when storage is created from scratch.
    pub seed_on_create: bool,
    pub log_level: String,
    /// `None` leaves logging uninitialized.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            seed_on_create: true,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Reads `NOTEPIPE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = non_empty(lookup(ENV_DB_PATH)) {
            config.store = if path == MEMORY_LOCATION {
                StoreConfig::memory()
            } else {
                StoreConfig::file(path)
            };
        }
        if let Some(raw) = non_empty(lookup(ENV_SEED)) {
            config.seed_on_create = parse_flag(ENV_SEED, &raw)?;
        }
        if let Some(level) = non_empty(lookup(ENV_LOG_LEVEL)) {
            config.log_level = level;
        }
        if let Some(dir) = non_empty(lookup(ENV_LOG_DIR)) {
            config.log_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, StoreConfig, ENV_DB_PATH, ENV_LOG_DIR, ENV_SEED};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = CoreConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.store, StoreConfig::memory());
        assert!(config.seed_on_create);
    }

    #[test]
    fn file_path_and_flags_are_read() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            (ENV_DB_PATH, "/tmp/notes.db"),
            (ENV_SEED, "No"),
            (ENV_LOG_DIR, "/tmp/logs"),
        ]))
        .unwrap();
        assert_eq!(config.store, StoreConfig::file("/tmp/notes.db"));
        assert!(!config.seed_on_create);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn memory_marker_selects_in_memory_store() {
        let config = CoreConfig::from_lookup(lookup_from(&[(ENV_DB_PATH, ":memory:")])).unwrap();
        assert_eq!(config.store, StoreConfig::memory());
    }

    #[test]
    fn bad_seed_flag_is_rejected() {
        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_SEED, "maybe")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_SEED,
                value: "maybe".to_string(),
            }
        );
    }
}
