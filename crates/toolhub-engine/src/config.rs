//! # Engine Configuration
//!
//! Configuration management for the settlement engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TOOLHUB_DB_PATH=/var/lib/toolhub/toolhub.db                        │
//! │     TOOLHUB_LIFETIME_DAYS=36500                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/toolhub/toolhub.toml (Linux)                             │
//! │     ~/Library/Application Support/com.toolhub.engine/toolhub.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/toolhub/toolhub.db"
//! max_connections = 5
//!
//! [entitlement]
//! lifetime_days = 36500
//! free_or_trial_days = 365
//! days_per_month = 30
//! days_per_year = 365
//!
//! [orders]
//! max_cart_lines = 50
//! max_period_count = 36
//! require_proof_for_online = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use toolhub_core::entitlement::DurationPolicy;
use toolhub_core::{MAX_CART_LINES, MAX_PERIOD_COUNT};
use toolhub_db::DbConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config path available")]
    NoConfigPath,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path. `:memory:` for a throwaway database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long to wait for a free connection (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "toolhub", "engine")
        .map(|dirs| dirs.data_dir().join("toolhub.db"))
        .unwrap_or_else(|| PathBuf::from("toolhub.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Entitlement Settings
// =============================================================================

/// Day counts behind every grant.
///
/// The defaults are the values customers have always been sold; changing
/// them only affects grants made afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementSettings {
    #[serde(default = "default_lifetime_days")]
    pub lifetime_days: i64,

    /// Length of a free or trial grant without explicit trial days.
    #[serde(default = "default_free_or_trial_days")]
    pub free_or_trial_days: i64,

    #[serde(default = "default_days_per_month")]
    pub days_per_month: i64,

    #[serde(default = "default_days_per_year")]
    pub days_per_year: i64,
}

fn default_lifetime_days() -> i64 {
    36_500
}

fn default_free_or_trial_days() -> i64 {
    365
}

fn default_days_per_month() -> i64 {
    30
}

fn default_days_per_year() -> i64 {
    365
}

impl Default for EntitlementSettings {
    fn default() -> Self {
        EntitlementSettings {
            lifetime_days: default_lifetime_days(),
            free_or_trial_days: default_free_or_trial_days(),
            days_per_month: default_days_per_month(),
            days_per_year: default_days_per_year(),
        }
    }
}

impl EntitlementSettings {
    pub fn duration_policy(&self) -> DurationPolicy {
        DurationPolicy {
            lifetime_days: self.lifetime_days,
            free_or_trial_days: self.free_or_trial_days,
            days_per_month: self.days_per_month,
            days_per_year: self.days_per_year,
        }
    }
}

// =============================================================================
// Order Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSettings {
    #[serde(default = "default_max_cart_lines")]
    pub max_cart_lines: usize,

    #[serde(default = "default_max_period_count")]
    pub max_period_count: i64,

    /// Online payments are reconciled by hand, so they carry a reference
    /// just like offline ones.
    #[serde(default = "default_true")]
    pub require_proof_for_online: bool,
}

fn default_max_cart_lines() -> usize {
    MAX_CART_LINES
}

fn default_max_period_count() -> i64 {
    MAX_PERIOD_COUNT
}

impl Default for OrderSettings {
    fn default() -> Self {
        OrderSettings {
            max_cart_lines: default_max_cart_lines(),
            max_period_count: default_max_period_count(),
            require_proof_for_online: true,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub entitlement: EntitlementSettings,

    #[serde(default)]
    pub orders: OrderSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (toolhub.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(
                "database.min_connections cannot exceed max_connections".into(),
            ));
        }

        let day_counts = [
            ("entitlement.lifetime_days", self.entitlement.lifetime_days),
            ("entitlement.free_or_trial_days", self.entitlement.free_or_trial_days),
            ("entitlement.days_per_month", self.entitlement.days_per_month),
            ("entitlement.days_per_year", self.entitlement.days_per_year),
        ];
        for (field, days) in day_counts {
            if days <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be greater than 0, got {}",
                    field, days
                )));
            }
        }

        if self.orders.max_cart_lines == 0 {
            return Err(ConfigError::Invalid(
                "orders.max_cart_lines must be greater than 0".into(),
            ));
        }
        if self.orders.max_period_count < 1 {
            return Err(ConfigError::Invalid(
                "orders.max_period_count must be at least 1".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TOOLHUB_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("TOOLHUB_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid TOOLHUB_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(days) = std::env::var("TOOLHUB_LIFETIME_DAYS") {
            match days.parse::<i64>() {
                Ok(n) => self.entitlement.lifetime_days = n,
                Err(_) => warn!(value = %days, "Ignoring invalid TOOLHUB_LIFETIME_DAYS"),
            }
        }

        if let Ok(days) = std::env::var("TOOLHUB_FREE_GRANT_DAYS") {
            match days.parse::<i64>() {
                Ok(n) => self.entitlement.free_or_trial_days = n,
                Err(_) => warn!(value = %days, "Ignoring invalid TOOLHUB_FREE_GRANT_DAYS"),
            }
        }

        if let Ok(lines) = std::env::var("TOOLHUB_MAX_CART_LINES") {
            match lines.parse::<usize>() {
                Ok(n) => self.orders.max_cart_lines = n,
                Err(_) => warn!(value = %lines, "Ignoring invalid TOOLHUB_MAX_CART_LINES"),
            }
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "toolhub", "engine")
            .map(|dirs| dirs.config_dir().join("toolhub.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pool settings for `toolhub_db::Database::new`.
    pub fn db_config(&self) -> DbConfig {
        // Each in-memory connection is its own database; keep the single one
        if self.database.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory().run_migrations(self.database.run_migrations);
        }

        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .run_migrations(self.database.run_migrations)
    }

    pub fn duration_policy(&self) -> DurationPolicy {
        self.entitlement.duration_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.entitlement.lifetime_days, 36_500);
        assert_eq!(config.entitlement.free_or_trial_days, 365);
        assert_eq!(config.orders.max_cart_lines, 50);
        assert_eq!(config.orders.max_period_count, 36);
        assert!(config.orders.require_proof_for_online);
        assert_eq!(config.duration_policy(), DurationPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [orders]
            max_cart_lines = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.orders.max_cart_lines, 10);
        assert_eq!(config.orders.max_period_count, 36);
        assert_eq!(config.entitlement.days_per_year, 365);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.entitlement.days_per_month = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.database.min_connections = 10;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.orders.max_period_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("toolhub.toml");

        let mut config = EngineConfig::default();
        config.orders.require_proof_for_online = false;
        config.entitlement.days_per_month = 31;
        config.save(Some(path.clone())).unwrap();

        let loaded = EngineConfig::load(Some(path)).unwrap();
        assert!(!loaded.orders.require_proof_for_online);
        assert_eq!(loaded.entitlement.days_per_month, 31);
    }

    #[test]
    fn test_db_config_mapping() {
        let mut config = EngineConfig::default();
        config.database.path = PathBuf::from("/tmp/toolhub-test.db");
        config.database.max_connections = 8;
        config.database.connect_timeout_secs = 3;

        let db = config.db_config();
        assert_eq!(db.database_path, PathBuf::from("/tmp/toolhub-test.db"));
        assert_eq!(db.max_connections, 8);
        assert_eq!(db.connect_timeout, Duration::from_secs(3));
    }
}
