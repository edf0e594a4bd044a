//! Bootstrap script assembly.
//!
//! The debuggee receives one Lua script on attach: the bundled bootstrap
//! with the custom type registry spliced in at a textual placeholder.
//! Registry resolution order: the user-configured path, then the dev-mode
//! script directory, then the bundled default.

use std::path::Path;

use crate::config::DebuggerConfig;
use crate::error::{IntelError, IntelResult};

const BOOTSTRAP: &str = include_str!("bootstrap.lua");
const DEFAULT_CUSTOM_TYPES: &str = include_str!("custom_types.lua");

/// Placeholder in the bundled bootstrap where the registry goes.
pub const PLACEHOLDER: &str = "--[[__CUSTOM_TYPES__]]";

const DEV_SCRIPT_NAME: &str = "custom_types.lua";

/// Assemble the full bootstrap script for `config`.
pub fn build_bootstrap(config: &DebuggerConfig) -> IntelResult<String> {
    let registry = custom_types_script(config)?;
    Ok(BOOTSTRAP.replace(PLACEHOLDER, &registry))
}

/// The custom type registry script, resolved per the precedence above.
/// A configured path that cannot be read is an error, not a silent
/// fallback; the dev directory is only consulted when it has the script.
pub fn custom_types_script(config: &DebuggerConfig) -> IntelResult<String> {
    if let Some(path) = &config.custom_types_path {
        return read_script(path);
    }
    if let Some(dir) = &config.dev_script_dir {
        let candidate = dir.join(DEV_SCRIPT_NAME);
        if candidate.is_file() {
            return read_script(&candidate);
        }
    }
    Ok(DEFAULT_CUSTOM_TYPES.to_string())
}

fn read_script(path: &Path) -> IntelResult<String> {
    std::fs::read_to_string(path).map_err(|e| IntelError::Bridge {
        reason: format!("cannot read custom types script {}: {e}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_bundled_bootstrap_has_placeholder() {
        assert!(BOOTSTRAP.contains(PLACEHOLDER));
    }

    #[test]
    fn test_default_splice() {
        let config = DebuggerConfig::default();
        let script = build_bootstrap(&config).unwrap();
        assert!(!script.contains(PLACEHOLDER));
        assert!(script.contains("registerType"));
    }

    #[test]
    fn test_user_path_wins_over_dev_dir() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("mine.lua");
        fs::write(&user, "-- user registry").unwrap();
        fs::write(dir.path().join(DEV_SCRIPT_NAME), "-- dev registry").unwrap();

        let config = DebuggerConfig {
            custom_types_path: Some(user),
            dev_script_dir: Some(dir.path().to_path_buf()),
            ..DebuggerConfig::default()
        };
        let script = build_bootstrap(&config).unwrap();
        assert!(script.contains("-- user registry"));
        assert!(!script.contains("-- dev registry"));
    }

    #[test]
    fn test_dev_dir_fallback() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DEV_SCRIPT_NAME), "-- dev registry").unwrap();

        let config = DebuggerConfig {
            dev_script_dir: Some(dir.path().to_path_buf()),
            ..DebuggerConfig::default()
        };
        let script = custom_types_script(&config).unwrap();
        assert_eq!(script, "-- dev registry");
    }

    #[test]
    fn test_unreadable_user_path_is_an_error() {
        let config = DebuggerConfig {
            custom_types_path: Some("/nonexistent/registry.lua".into()),
            ..DebuggerConfig::default()
        };
        assert!(matches!(
            build_bootstrap(&config),
            Err(IntelError::Bridge { .. })
        ));
    }
}
