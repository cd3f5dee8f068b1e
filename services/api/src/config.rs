//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use eco_portal_core::OverridePolicy;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// When absent the service keeps everything in memory.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub allowed_origin: String,
    pub override_policy: OverridePolicy,
    /// Open wizards untouched for this long are dropped from the registry.
    pub wizard_idle_ttl: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string(), e.to_string())
            })?,
            None => 5,
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Browser-facing Settings ---
        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        let override_policy = match lookup("ROLE_OVERRIDE_POLICY") {
            Some(raw) => raw
                .parse::<OverridePolicy>()
                .map_err(|e| ConfigError::InvalidValue("ROLE_OVERRIDE_POLICY".to_string(), e))?,
            None => OverridePolicy::default(),
        };

        // --- Wizard Registry ---
        let wizard_idle_ttl = match lookup("WIZARD_IDLE_TTL_SECS") {
            Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                ConfigError::InvalidValue("WIZARD_IDLE_TTL_SECS".to_string(), e.to_string())
            })?,
            None => Duration::from_secs(30 * 60),
        };

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            allowed_origin,
            override_policy,
            wizard_idle_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.override_policy, OverridePolicy::OverrideWins);
        assert_eq!(config.wizard_idle_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn wizard_idle_ttl_is_read_in_seconds() {
        let config = load(&[("WIZARD_IDLE_TTL_SECS", "90")]).unwrap();
        assert_eq!(config.wizard_idle_ttl, Duration::from_secs(90));

        let err = load(&[("WIZARD_IDLE_TTL_SECS", "-1")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue(ref var, _) if var == "WIZARD_IDLE_TTL_SECS"
        ));
    }

    #[test]
    fn policy_and_database_are_read() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/eco"),
            ("ROLE_OVERRIDE_POLICY", "declared-wins"),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/eco"));
        assert_eq!(config.override_policy, OverridePolicy::DeclaredWins);
    }

    #[test]
    fn bad_values_are_reported_by_name() {
        let err = load(&[("ROLE_OVERRIDE_POLICY", "newest")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue(ref var, _) if var == "ROLE_OVERRIDE_POLICY"
        ));

        let err = load(&[("BIND_ADDRESS", "not-an-address")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue(ref var, _) if var == "BIND_ADDRESS"
        ));
    }
}
