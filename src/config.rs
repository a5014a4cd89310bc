//! Runtime configuration, read from the environment (and `.env` when present).

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::metrics::IncomeOptions;

pub const DB_PATH_VAR: &str = "SEMINAR_DB_PATH";
pub const BIND_ADDR_VAR: &str = "SEMINAR_BIND_ADDR";
pub const INCLUDE_PLANNING_FEES_VAR: &str = "INCLUDE_PLANNING_FEES";

fn default_db_path() -> PathBuf {
    PathBuf::from("seminar_events.db")
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// Default income policy; requests may override it.
    pub income: IncomeOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind_addr: default_bind_addr(),
            income: IncomeOptions::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or blank keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = get(DB_PATH_VAR).map(PathBuf::from).unwrap_or_else(default_db_path);

        let bind_addr = match get(BIND_ADDR_VAR) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: BIND_ADDR_VAR,
                value: raw.clone(),
            })?,
            None => default_bind_addr(),
        };

        let include_planning_fees = match get(INCLUDE_PLANNING_FEES_VAR) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: INCLUDE_PLANNING_FEES_VAR,
                value: raw.clone(),
            })?,
            None => false,
        };

        Ok(Self {
            db_path,
            bind_addr,
            income: IncomeOptions {
                include_planning_fees,
            },
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(!config.income.include_planning_fees);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (DB_PATH_VAR, "/tmp/events.db"),
            (BIND_ADDR_VAR, "0.0.0.0:9000"),
            (INCLUDE_PLANNING_FEES_VAR, "Yes"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/events.db"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert!(config.income.include_planning_fees);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_lookup(lookup(&[(BIND_ADDR_VAR, "localhost")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: BIND_ADDR_VAR, .. }));

        let err = AppConfig::from_lookup(lookup(&[(INCLUDE_PLANNING_FEES_VAR, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: INCLUDE_PLANNING_FEES_VAR, .. }));
    }
}
