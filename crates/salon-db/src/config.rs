//! # Configuration
//!
//! Salon POS settings loaded from a TOML file with environment overrides.
//!
//! ## Priority (highest wins)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Environment variables   SALON_DB_PATH, SALON_SERVICE_CHARGE_BPS,    │
//! │                             SALON_LOYALTY_ACCRUAL_BPS,                  │
//! │                             SALON_MAX_CONNECTIONS                       │
//! │  2. salon.toml              [database] / [billing]                      │
//! │  3. Defaults                ./salon.db, 0% service charge, 1 pt / ₱100  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example salon.toml
//! ```toml
//! [database]
//! path = "/var/lib/salon/salon.db"
//! max_connections = 5
//!
//! [billing]
//! service_charge_bps = 500
//! loyalty_accrual_bps = 100
//! ```

use std::path::{Path, PathBuf};

use salon_core::{CheckoutPolicy, Rate};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::pool::DbConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },
}

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: PathBuf::from("salon.db"),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SalonConfig {
    pub database: DatabaseSection,
    pub billing: CheckoutPolicy,
}

impl SalonConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(source: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` if it exists, falls back to defaults otherwise, then
    /// applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            debug!(path = %path.display(), "Loading config file");
            let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml_str(&source, path)?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            SalonConfig::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `SALON_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SALON_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(bps) = parse_env::<u32, _>(&lookup, "SALON_SERVICE_CHARGE_BPS")? {
            self.billing.service_charge_rate = Rate::from_bps(bps);
        }
        if let Some(bps) = parse_env::<u32, _>(&lookup, "SALON_LOYALTY_ACCRUAL_BPS")? {
            self.billing.loyalty_accrual_rate = Rate::from_bps(bps);
        }
        if let Some(max) = parse_env::<u32, _>(&lookup, "SALON_MAX_CONNECTIONS")? {
            self.database.max_connections = max;
        }
        Ok(())
    }

    /// Pool settings for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(std::time::Duration::from_secs(self.database.connect_timeout_secs))
    }
}

fn parse_env<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SalonConfig::default();
        assert_eq!(config.database.path, PathBuf::from("salon.db"));
        assert_eq!(config.billing.loyalty_accrual_rate, Rate::from_bps(100));
        assert!(config.billing.service_charge_rate.is_zero());
    }

    #[test]
    fn test_parse_toml() {
        let config = SalonConfig::from_toml_str(
            r#"
            [database]
            path = "/var/lib/salon/salon.db"
            max_connections = 8

            [billing]
            service_charge_bps = 500
            "#,
            Path::new("salon.toml"),
        )
        .unwrap();

        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(config.billing.service_charge_rate, Rate::from_bps(500));
        assert_eq!(config.billing.loyalty_accrual_rate, Rate::from_bps(100));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SALON_DB_PATH", "/tmp/override.db"),
            ("SALON_SERVICE_CHARGE_BPS", "1000"),
            ("SALON_MAX_CONNECTIONS", "2"),
        ]);
        let mut config = SalonConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.billing.service_charge_rate, Rate::from_bps(1000));
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.db_config().max_connections, 2);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = SalonConfig::default();
        let err = config
            .apply_overrides(|k| (k == "SALON_LOYALTY_ACCRUAL_BPS").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = SalonConfig::load("/nonexistent/salon.toml").unwrap();
        assert!(config.database.max_connections >= 1);
    }
}
