//! Engine configuration for fcti-ta
//!
//! Resolution order: compiled defaults, then the TOML file (explicit path,
//! `FCTI_CONFIG`, or `~/.config/fcti/config.toml`), then environment
//! overrides. Every TOML key is optional.

use fcti_common::config::{load_toml_config, resolve_config_path, LoggingConfig, CONFIG_ENV_VAR};
use fcti_common::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub const DATABASE_ENV_VAR: &str = "FCTI_DATABASE";
pub const REGISTRY_URL_ENV_VAR: &str = "FCTI_REGISTRY_URL";
pub const FALLBACK_REGISTRY_URL_ENV_VAR: &str = "FCTI_FALLBACK_REGISTRY_URL";
pub const BIND_ENV_VAR: &str = "FCTI_BIND";
pub const LOG_LEVEL_ENV_VAR: &str = "FCTI_LOG_LEVEL";

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub discovery: DiscoveryConfig,
    pub registry: RegistryConfig,
    pub survival: SurvivalConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
}

/// Discovery safety limits and retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub max_iterations: u32,
    pub max_documents: usize,
    pub max_searches: u32,
    /// Deed-only span (years) that counts as a complete chain
    pub lookback_years: u32,
    /// Failed attempts before a task is permanently failed
    pub max_attempts: u32,
    /// Registry calls one property may have in flight
    pub per_property_concurrency: usize,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_documents: 500,
            max_searches: 200,
            lookback_years: 30,
            max_attempts: 3,
            per_property_concurrency: 2,
            base_backoff_secs: 30,
            max_backoff_secs: 900,
        }
    }
}

/// Document registry channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    /// Degraded channel used after repeated rate limits
    pub fallback_url: Option<String>,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Rate limits within the window that switch traffic to the fallback
    pub degrade_threshold: usize,
    pub degrade_window_secs: u64,
    pub degrade_cooldown_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            fallback_url: None,
            requests_per_second: 2,
            timeout_secs: 20,
            connect_timeout_secs: 5,
            degrade_threshold: 5,
            degrade_window_secs: 60,
            degrade_cooldown_secs: 300,
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Statutory parameters of the survival engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivalConfig {
    /// Months of unpaid assessments a first mortgagee owes at most
    pub safe_harbor_months: u32,
    /// Percent of the original first-mortgage principal capping the same
    pub safe_harbor_percent: f64,
    pub expiration: ExpirationConfig,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        Self {
            safe_harbor_months: 12,
            safe_harbor_percent: 1.0,
            expiration: ExpirationConfig::default(),
        }
    }
}

/// Lien lifetimes in years from recording (or maturity, for mortgages)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpirationConfig {
    pub mechanics_lien: u32,
    pub association_claim: u32,
    pub judgment_lien: u32,
    pub code_enforcement: u32,
    pub federal_tax: u32,
    pub mortgage_after_maturity: u32,
    pub mortgage_without_maturity: u32,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            mechanics_lien: 1,
            association_claim: 1,
            judgment_lien: 10,
            code_enforcement: 20,
            federal_tax: 10,
            mortgage_after_maturity: 5,
            mortgage_without_maturity: 35,
        }
    }
}

/// Service wiring: worker pool, store, read API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub worker_pool_size: usize,
    pub database_path: String,
    pub bind_addr: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            database_path: "fcti.db".to_string(),
            bind_addr: "127.0.0.1:5760".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file and environment
    ///
    /// # Arguments
    /// * `explicit_path` - Config file given on the command line, if any
    ///
    /// # Errors
    /// `Error::Config` when a config file exists but cannot be parsed.
    pub fn load(explicit_path: Option<&str>) -> Result<Self> {
        let mut config = match resolve_config_path(explicit_path, CONFIG_ENV_VAR) {
            Some(path) => {
                info!(path = %path.display(), "Loading engine configuration");
                load_toml_config::<EngineConfig>(&path)?
            }
            None => {
                info!("No configuration file found, using defaults");
                EngineConfig::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `FCTI_*` environment overrides in place
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_value(DATABASE_ENV_VAR) {
            self.service.database_path = value;
        }
        if let Some(value) = env_value(REGISTRY_URL_ENV_VAR) {
            self.registry.base_url = value;
        }
        if let Some(value) = env_value(FALLBACK_REGISTRY_URL_ENV_VAR) {
            self.registry.fallback_url = Some(value);
        }
        if let Some(value) = env_value(BIND_ENV_VAR) {
            self.service.bind_addr = value;
        }
        if let Some(value) = env_value(LOG_LEVEL_ENV_VAR) {
            self.logging.level = value;
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.discovery.max_iterations, 50);
        assert_eq!(config.discovery.max_documents, 500);
        assert_eq!(config.discovery.max_searches, 200);
        assert_eq!(config.discovery.lookback_years, 30);
        assert_eq!(config.registry.degrade_threshold, 5);
        assert_eq!(config.survival.safe_harbor_months, 12);
        assert_eq!(config.survival.expiration.judgment_lien, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    #[serial]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[discovery]\nmax_searches = 20\n\n[survival.expiration]\njudgment_lien = 20\n",
        )
        .unwrap();

        let config = EngineConfig::load(path.to_str()).unwrap();
        assert_eq!(config.discovery.max_searches, 20);
        assert_eq!(config.discovery.max_iterations, 50);
        assert_eq!(config.survival.expiration.judgment_lien, 20);
        assert_eq!(config.survival.expiration.mechanics_lien, 1);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[registry]\nbase_url = \"http://file\"\n").unwrap();

        std::env::set_var(REGISTRY_URL_ENV_VAR, "http://env");
        std::env::set_var(DATABASE_ENV_VAR, "/tmp/fcti-test.db");
        let config = EngineConfig::load(path.to_str()).unwrap();
        std::env::remove_var(REGISTRY_URL_ENV_VAR);
        std::env::remove_var(DATABASE_ENV_VAR);

        assert_eq!(config.registry.base_url, "http://env");
        assert_eq!(config.service.database_path, "/tmp/fcti-test.db");
    }
}
