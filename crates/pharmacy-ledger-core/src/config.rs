//! Runtime configuration.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub const ENV_DATABASE_PATH: &str = "PHARMACY_LEDGER_DB";
pub const ENV_MAX_RETRIES: &str = "PHARMACY_LEDGER_MAX_RETRIES";
pub const ENV_LOG_FILTER: &str = "PHARMACY_LEDGER_LOG";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite file; `None` means in-memory
    pub database_path: Option<PathBuf>,
    /// Extra attempts of a load-mutate-save cycle after a revision conflict
    pub max_conflict_retries: u32,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_conflict_retries: 3,
            log_filter: "info".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Load from the process environment, reading a `.env` file first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|p| !p.trim().is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            config.max_conflict_retries =
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_MAX_RETRIES,
                        value: raw.clone(),
                    })?;
        }

        if let Some(filter) = lookup(ENV_LOG_FILTER).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_overrides() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (ENV_DATABASE_PATH, "/var/lib/ledger.db"),
            (ENV_MAX_RETRIES, "5"),
            (ENV_LOG_FILTER, "pharmacy_ledger_core=debug"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, Some(PathBuf::from("/var/lib/ledger.db")));
        assert_eq!(config.max_conflict_retries, 5);
        assert_eq!(config.log_filter, "pharmacy_ledger_core=debug");
    }

    #[test]
    fn test_invalid_retries() {
        let result = LedgerConfig::from_lookup(lookup(&[(ENV_MAX_RETRIES, "many")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LedgerConfig = serde_json::from_str(r#"{"max_conflict_retries": 1}"#).unwrap();
        assert_eq!(config.max_conflict_retries, 1);
        assert_eq!(config.log_filter, "info");
    }
}
