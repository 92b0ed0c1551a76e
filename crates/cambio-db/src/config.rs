//! Ledger configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                     | Default        |
//! |------------------------------|----------------|
//! | `CAMBIO_DB_PATH`             | `./cambio.db`  |
//! | `CAMBIO_DB_MAX_CONNECTIONS`  | `5`            |
//! | `CAMBIO_BALANCE_TOLERANCE`   | `0.01`         |

use std::env;
use std::path::PathBuf;

use cambio_core::Money;

use crate::pool::DbConfig;

/// Ledger service configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Reconciliation tolerance (a difference strictly below it reads as balanced)
    pub balance_tolerance: Money,
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup.
    pub fn load_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_connections: u32 = lookup("CAMBIO_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("CAMBIO_DB_MAX_CONNECTIONS".to_string()))?;

        if max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "CAMBIO_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        let balance_tolerance = lookup("CAMBIO_BALANCE_TOLERANCE")
            .unwrap_or_else(|| "0.01".to_string())
            .parse::<Money>()
            .ok()
            .filter(|tolerance| !tolerance.is_negative())
            .ok_or_else(|| ConfigError::InvalidValue("CAMBIO_BALANCE_TOLERANCE".to_string()))?;

        Ok(LedgerConfig {
            database_path: lookup("CAMBIO_DB_PATH")
                .filter(|path| !path.trim().is_empty())
                .unwrap_or_else(|| "./cambio.db".to_string())
                .into(),
            max_connections,
            balance_tolerance,
        })
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .balance_tolerance(self.balance_tolerance)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
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
    fn test_defaults() {
        let config = LedgerConfig::load_from(lookup(&[])).unwrap();
        assert_eq!(config.database_path, PathBuf::from("./cambio.db"));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.balance_tolerance, Money::from_cents(1));
    }

    #[test]
    fn test_overrides() {
        let config = LedgerConfig::load_from(lookup(&[
            ("CAMBIO_DB_PATH", "/var/lib/cambio/ledger.db"),
            ("CAMBIO_DB_MAX_CONNECTIONS", "12"),
            ("CAMBIO_BALANCE_TOLERANCE", "0.50"),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 12);
        assert_eq!(config.balance_tolerance, Money::from_cents(50));

        let db = config.db_config();
        assert_eq!(db.database_path, PathBuf::from("/var/lib/cambio/ledger.db"));
        assert_eq!(db.max_connections, 12);
        assert_eq!(db.balance_tolerance, Money::from_cents(50));
    }

    #[test]
    fn test_invalid_values() {
        let err = LedgerConfig::load_from(lookup(&[("CAMBIO_DB_MAX_CONNECTIONS", "lots")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for CAMBIO_DB_MAX_CONNECTIONS");

        assert!(LedgerConfig::load_from(lookup(&[("CAMBIO_DB_MAX_CONNECTIONS", "0")])).is_err());
        assert!(LedgerConfig::load_from(lookup(&[("CAMBIO_BALANCE_TOLERANCE", "-1")])).is_err());
        assert!(LedgerConfig::load_from(lookup(&[("CAMBIO_BALANCE_TOLERANCE", "0.001")])).is_err());
    }
}
