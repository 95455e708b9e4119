//! Integration tests for config file discovery and graceful degradation
//!
//! Tests that touch ORGMATCH_CONFIG are marked #[serial] so they do not race
//! on the process environment.

use orgmatch_common::config::{
    load_or_default, load_toml, ConfigFileResolver, LoggingConfig, CONFIG_ENV_VAR,
};
use orgmatch_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize)]
struct AppConfig {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    threshold: Option<f64>,
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/orgmatch-env-config.toml");

    let resolver = ConfigFileResolver::default();
    let path = resolver.resolve(None);

    assert_eq!(path, Some(PathBuf::from("/tmp/orgmatch-env-config.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_arg_takes_precedence_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/orgmatch-env-config.toml");

    let resolver = ConfigFileResolver::default();
    let path = resolver.resolve(Some(std::path::Path::new("/tmp/cli.toml")));

    assert_eq!(path, Some(PathBuf::from("/tmp/cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    let resolver = ConfigFileResolver::default();
    let path = resolver.resolve(None);

    // Falls through to the well-known locations, which never equal the blank value
    assert_ne!(path, Some(PathBuf::from("   ")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_missing_file_degrades_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");

    let config: AppConfig = load_or_default(Some(&missing)).unwrap();

    assert_eq!(config.logging.level, "info");
    assert!(config.threshold.is_none());
}

#[test]
fn test_existing_file_is_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "threshold = 0.7\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config: AppConfig = load_or_default(Some(&path)).unwrap();

    assert_eq!(config.threshold, Some(0.7));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "threshold = [unterminated\n").unwrap();

    let result: orgmatch_common::Result<AppConfig> = load_or_default(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_toml_missing_explicit_file_errors() {
    let result: orgmatch_common::Result<AppConfig> =
        load_toml(std::path::Path::new("/nonexistent/orgmatch/config.toml"));
    assert!(matches!(result, Err(Error::Config(_))));
}
