//! Configuration file discovery and TOML loading
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`ORGMATCH_CONFIG` by default)
//! 3. Per-user config file (`~/.config/orgmatch/config.toml`)
//! 4. System config file (`/etc/orgmatch/config.toml`, Linux only)
//! 5. Built-in defaults (no file)
//!
//! A missing config file is never fatal: callers get `T::default()` and a
//! warning in the log.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ORGMATCH_CONFIG";

/// Application directory name under the platform config dir
const APP_DIR: &str = "orgmatch";

/// Logging configuration (`[logging]` table)
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit ANSI colours on stderr
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: default_ansi(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ansi() -> bool {
    true
}

/// Resolves which config file (if any) should be loaded
pub struct ConfigFileResolver {
    env_var_name: String,
}

impl ConfigFileResolver {
    /// Create a resolver reading the given environment variable at priority 2
    pub fn new(env_var_name: impl Into<String>) -> Self {
        Self {
            env_var_name: env_var_name.into(),
        }
    }

    /// Resolve the config file path
    ///
    /// Returns `None` when no explicit path is given and no default file exists.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3/4: Well-known locations
        default_config_locations().into_iter().find(|p| p.exists())
    }
}

impl Default for ConfigFileResolver {
    fn default() -> Self {
        Self::new(CONFIG_ENV_VAR)
    }
}

/// Well-known config file locations, in lookup order
pub fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join(APP_DIR).join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        locations.push(PathBuf::from("/etc").join(APP_DIR).join("config.toml"));
    }
    locations
}

/// Parse a TOML document into `T`
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load `T` from a TOML file
///
/// An explicitly named file that does not exist is an error; use
/// [`load_or_default`] for graceful degradation.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    parse_toml(&content)
}

/// Load `T` from the resolved config file, or fall back to `T::default()`
///
/// A file that exists but fails to parse is still an error: silently running
/// with defaults would hide a broken deployment.
pub fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            load_toml(path)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(T::default())
        }
        None => {
            info!("No config file found, using built-in defaults");
            Ok(T::default())
        }
    }
}

/// Standard User-Agent for outbound HTTP clients
pub fn user_agent() -> String {
    format!("orgmatch/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct Sample {
        #[serde(default)]
        logging: LoggingConfig,
        #[serde(default)]
        name: Option<String>,
    }

    #[test]
    fn test_logging_defaults() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.level, "info");
        assert!(logging.ansi);
    }

    #[test]
    fn test_parse_partial_document() {
        let sample: Sample = parse_toml("name = \"x\"\n").unwrap();
        assert_eq!(sample.name.as_deref(), Some("x"));
        assert_eq!(sample.logging.level, "info");
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let result: Result<Sample> = parse_toml("name = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_cli_arg_wins() {
        let resolver = ConfigFileResolver::new("ORGMATCH_TEST_UNSET_VAR");
        let path = resolver.resolve(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }

    #[test]
    fn test_user_agent_format() {
        assert!(user_agent().starts_with("orgmatch/"));
    }
}
