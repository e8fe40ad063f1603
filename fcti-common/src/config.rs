//! Configuration file resolution and TOML loading
//!
//! Config file priority order:
//! 1. Explicit path (command-line argument or caller supplied)
//! 2. Environment variable (`FCTI_CONFIG` by convention)
//! 3. User config directory (`~/.config/fcti/config.toml` on Linux)
//! 4. None: callers fall back to compiled defaults
//!
//! A missing or unreadable file is never fatal: the caller receives
//! defaults and a warning is logged.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FCTI_CONFIG";

/// Logging configuration shared by every FCTI binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve which config file (if any) should be read
pub fn resolve_config_path(cli_arg: Option<&str>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: explicit argument
    if let Some(path) = cli_arg {
        return Some(PathBuf::from(path));
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: per-user config directory
    let user_config = dirs::config_dir().map(|d| d.join("fcti").join("config.toml"));
    match user_config {
        Some(path) if path.exists() => Some(path),
        _ => None,
    }
}

/// Load a TOML config file into `T`
///
/// Returns `T::default()` with a warning when the file does not exist.
/// A file that exists but does not parse is a configuration error.
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    debug!(path = %path.display(), "Config file loaded");
    Ok(config)
}

/// Write a config value as TOML, replacing the file atomically
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Create {} failed: {}", parent.display(), e)))?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)
        .map_err(|e| Error::Config(format!("Write {} failed: {}", tmp_path.display(), e)))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Config(format!("Rename to {} failed: {}", path.display(), e)))?;
    Ok(())
}

/// User-agent presented to document registries
pub fn get_user_agent() -> String {
    format!(
        "FCTI/{} (title-analysis)",
        env!("CARGO_PKG_VERSION")
    )
}
