//! Configuration module for the Lua intelligence core.
//!
//! Layered configuration:
//! - Default values
//! - TOML configuration file (`lualens.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `LUALENS_` and use double
//! underscores to separate nested levels:
//! - `LUALENS_CACHE__TIER2_TTL_SECS=60` sets `cache.tier2_ttl_secs`
//! - `LUALENS_DEBUGGER__PORT=8819` sets `debugger.port`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{IntelError, IntelResult};

pub const CONFIG_FILE_NAME: &str = "lualens.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where lualens.toml is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Cache tuning
    #[serde(default)]
    pub cache: CacheConfig,

    /// Indexing configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Debugger bridge settings
    #[serde(default)]
    pub debugger: DebuggerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Capacity of the request-scoped tier-1 LRU
    #[serde(default = "default_tier1_capacity")]
    pub tier1_capacity: usize,

    /// Capacity of the shared tier-2 cache
    #[serde(default = "default_tier2_capacity")]
    pub tier2_capacity: usize,

    /// TTL for tier-2 entries, in seconds
    #[serde(default = "default_tier2_ttl_secs")]
    pub tier2_ttl_secs: u64,

    /// Minimum interval between opportunistic expiry sweeps, in seconds
    #[serde(default = "default_sweep_cooldown_secs")]
    pub sweep_cooldown_secs: u64,

    /// Capacity of the class hierarchy cache
    #[serde(default = "default_hierarchy_capacity")]
    pub hierarchy_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Project root directory (defaults to workspace root).
    /// Used for gitignore resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,

    /// Patterns to ignore during indexing
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DebuggerConfig {
    /// Debuggee host to connect to
    #[serde(default = "default_debugger_host")]
    pub host: String,

    /// Debuggee port
    #[serde(default = "default_debugger_port")]
    pub port: u16,

    /// User-provided custom type registry script. When unset, the bundled
    /// default script is spliced into the bootstrap instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_types_path: Option<PathBuf>,

    /// Development-mode script directory searched before the bundled
    /// resource (but after `custom_types_path`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_script_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level filter (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target level overrides, e.g. `{ "lualens::cache" = "debug" }`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_tier1_capacity() -> usize {
    100
}
fn default_tier2_capacity() -> usize {
    10_000
}
fn default_tier2_ttl_secs() -> u64 {
    300
}
fn default_sweep_cooldown_secs() -> u64 {
    30
}
fn default_hierarchy_capacity() -> usize {
    2_000
}
fn default_debugger_host() -> String {
    "127.0.0.1".to_string()
}
fn default_debugger_port() -> u16 {
    8818
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            debug: false,
            cache: CacheConfig::default(),
            indexing: IndexingConfig::default(),
            debugger: DebuggerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tier1_capacity: default_tier1_capacity(),
            tier2_capacity: default_tier2_capacity(),
            tier2_ttl_secs: default_tier2_ttl_secs(),
            sweep_cooldown_secs: default_sweep_cooldown_secs(),
            hierarchy_capacity: default_hierarchy_capacity(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            project_root: None,
            ignore_patterns: vec![
                ".git/**".to_string(),
                "node_modules/**".to_string(),
                "*.min.lua".to_string(),
            ],
        }
    }
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            host: default_debugger_host(),
            port: default_debugger_port(),
            custom_types_path: None,
            dev_script_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings with the full layering: defaults, then the TOML file
    /// (when present), then `LUALENS_*` environment variables.
    pub fn load(config_path: Option<&Path>) -> IntelResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(IntelError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                figment = figment.merge(Toml::file(CONFIG_FILE_NAME));
            }
        }

        let mut settings: Settings = figment
            .merge(Env::prefixed("LUALENS_").split("__"))
            .extract()
            .map_err(|e| IntelError::Config(e.to_string()))?;

        if settings.workspace_root.is_none() {
            settings.workspace_root = std::env::current_dir().ok();
        }

        Ok(settings)
    }

    /// Write the current settings as TOML to `path`.
    pub fn save(&self, path: &Path) -> IntelResult<()> {
        let rendered =
            toml::to_string_pretty(self).map_err(|e| IntelError::Config(e.to_string()))?;
        std::fs::write(path, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.cache.tier1_capacity, 100);
        assert_eq!(settings.cache.tier2_capacity, 10_000);
        assert_eq!(settings.cache.tier2_ttl_secs, 300);
        assert_eq!(settings.debugger.port, 8818);
        assert!(settings.debugger.custom_types_path.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut settings = Settings::default();
        settings.cache.tier2_ttl_secs = 60;
        settings.save(&path).unwrap();

        let loaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(loaded.cache.tier2_ttl_secs, 60);
        assert_eq!(loaded.cache.tier1_capacity, 100);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/lualens.toml"))).unwrap_err();
        assert!(matches!(err, IntelError::Config(_)));
    }
}
